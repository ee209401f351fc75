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

use std::time::Duration;

/// Timing knobs of a [`SubscriptionManager`](crate::SubscriptionManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// A ping is sent after this long without data from the server.
    pub idle_timeout: Duration,

    /// Consecutive silent periods tolerated before reconnecting.
    pub max_idle_periods: u32,

    /// Reconnect if a ping is not answered within this time.
    pub pong_timeout: Duration,

    /// Pause between a connection loss (or a failed attempt) and the next attempt.
    pub reconnect_delay: Duration,

    /// Default time [`subscribe`](crate::SubscriptionManager::subscribe) waits for
    /// the subscription to be sent.
    pub subscribe_timeout: Duration,

    /// Time [`unsubscribe`](crate::SubscriptionManager::unsubscribe) waits for
    /// the connection thread to end the subscription.
    pub command_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            max_idle_periods: 5,
            pong_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
            subscribe_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(3),
        }
    }
}
