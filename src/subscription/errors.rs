// (C) Copyright IBM Corp. 2025.
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

pub(crate) type Result<T> = std::result::Result<T, WorkerError>;

/// Errors that end the thread serving the connection.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WorkerError {
    #[error("Cannot acquire lock")]
    CannotAcquireLock,

    #[error("Thread failed with internal error: {0}")]
    ThreadInternalError(String),

    #[error("{0}")]
    UnrecoverableError(String),
}

impl<T> From<PoisonError<T>> for WorkerError {
    fn from(_value: PoisonError<T>) -> Self {
        WorkerError::CannotAcquireLock
    }
}
