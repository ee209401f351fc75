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

//! The subscription manager and the thread serving its connection.

mod connection_state;
mod connection_worker;
mod errors;
mod options;
mod registry;
mod subscription_manager;
mod thread_handle;

pub use connection_state::{ConnectionState, StartingReason};
pub use errors::WorkerError;
pub(crate) use errors::Result;
pub use options::ManagerOptions;
pub use subscription_manager::SubscriptionManager;
pub use thread_handle::ThreadStatus;
