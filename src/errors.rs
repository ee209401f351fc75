// (C) Copyright IBM Corp. 2024.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::PoisonError;

use thiserror::Error;

use crate::network::NetworkError;
use crate::subscription::WorkerError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot acquire lock")]
    CannotAcquireLock,

    #[error("Cannot use '{url}' as websocket endpoint: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    NetworkError(#[from] NetworkError),

    #[error(transparent)]
    WorkerError(#[from] WorkerError),

    #[error(transparent)]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_value: PoisonError<T>) -> Self {
        Error::CannotAcquireLock
    }
}
