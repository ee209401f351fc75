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

use super::Result;

/// Lifecycle of the connection served by a [`SubscriptionManager`](crate::SubscriptionManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet, or stopped on request.
    Stopped,

    /// Trying to (re)establish the connection.
    Starting(StartingReason),

    /// Connected and initialized, subscriptions are live.
    Running,

    /// The thread serving the connection is gone and it will not come back
    /// unless the manager is started again.
    Defunct(Result<()>),
}

impl ConnectionState {
    pub fn is_running(&self) -> bool {
        matches!(self, ConnectionState::Running)
    }
}

/// Why the connection is (re)starting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartingReason {
    Initializing,
    ConnectionFailed,
    WebsocketClosed,
    WebsocketError,
    NoData,
    PongTimeout,
}

impl std::fmt::Display for StartingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartingReason::Initializing => write!(f, "Initializing"),
            StartingReason::ConnectionFailed => write!(f, "ConnectionFailed"),
            StartingReason::WebsocketClosed => write!(f, "WebsocketClosed"),
            StartingReason::WebsocketError => write!(f, "WebsocketError"),
            StartingReason::NoData => write!(f, "NoData"),
            StartingReason::PongTimeout => write!(f, "PongTimeout"),
        }
    }
}
