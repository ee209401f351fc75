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

//! Manage GraphQL subscriptions over a single websocket connection.
//!
//! A [`SubscriptionManager`] owns one connection (sub-protocol
//! `graphql-subscriptions`) served by a background thread. Any number of
//! subscriptions can be multiplexed over it; data pushed by the server is
//! delivered to the callback registered with each subscription. The
//! connection is kept alive with pings and it is re-established (together
//! with every registered subscription) whenever it is lost.
//!
//! ```no_run
//! use graphql_subscription_manager::SubscriptionManager;
//! use serde_json::json;
//!
//! # fn main() -> graphql_subscription_manager::Result<()> {
//! let manager = SubscriptionManager::new(
//!     json!({"token": "secret"}),
//!     "wss://example.com/v1/gql/subscriptions",
//! )?;
//! manager.start()?;
//! let id = manager.subscribe("subscription { ticks }", |data| println!("{data}"))?;
//! println!("subscribed with id {id:?}");
//! manager.stop()?;
//! # Ok(())
//! # }
//! ```

mod builders;
mod errors;
pub mod network;
mod subscription;
mod utils;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use builders::SubscriptionManagerBuilder;
pub use errors::{Error, Result};
pub use network::serialization::SubscriptionId;
pub use network::{NetworkError, NetworkResult, Websocket, WebsocketConnector, WebsocketConnectorImpl};
pub use subscription::{
    ConnectionState, ManagerOptions, StartingReason, SubscriptionManager, ThreadStatus,
    WorkerError,
};
