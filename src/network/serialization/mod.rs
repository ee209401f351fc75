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

//! Models that are used for de/serialization of the messages interchanged
//! with the server

mod client_message;
mod server_message;
mod subscription_id;

pub(crate) use client_message::ClientMessage;
pub(crate) use server_message::{Route, ServerMessage};
pub use subscription_id::SubscriptionId;
