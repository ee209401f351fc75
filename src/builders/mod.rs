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

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::network::{WebsocketConnectorImpl, DEFAULT_SUBPROTOCOL};
use crate::{Error, ManagerOptions, Result, SubscriptionManager};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A [`SubscriptionManager`] builder for a websocket endpoint.
///
/// ```no_run
/// # use std::time::Duration;
/// # use graphql_subscription_manager::SubscriptionManager;
/// # use serde_json::json;
/// # fn main() -> graphql_subscription_manager::Result<()> {
/// let manager = SubscriptionManager::builder("wss://example.com/v1/gql/subscriptions")
///     .init_payload(json!({"token": "secret"}))
///     .user_agent("my-service/1.0")
///     .idle_timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SubscriptionManagerBuilder {
    url: String,
    init_payload: Value,
    user_agent: Option<String>,
    subprotocol: String,
    connect_timeout: Duration,
    poll_interval: Duration,
    options: ManagerOptions,
}

impl SubscriptionManagerBuilder {
    /// Creates a builder with default settings for the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - A `ws://` or `wss://` endpoint. It is validated in [`SubscriptionManagerBuilder::build`].
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            init_payload: Value::Object(Default::default()),
            user_agent: None,
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            options: ManagerOptions::default(),
        }
    }

    /// Payload of the `init` message sent on every new connection.
    pub fn init_payload(mut self, init_payload: Value) -> Self {
        self.init_payload = init_payload;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    /// Websocket sub-protocol requested in the handshake.
    pub fn subprotocol(mut self, subprotocol: &str) -> Self {
        self.subprotocol = subprotocol.to_string();
        self
    }

    /// Upper bound for opening the TCP connection and for the handshake.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How often the connection thread looks at pending commands and keep-alive
    /// timers while the server is quiet.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = timeout;
        self
    }

    pub fn max_idle_periods(mut self, periods: u32) -> Self {
        self.options.max_idle_periods = periods;
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.options.pong_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.reconnect_delay = delay;
        self
    }

    pub fn subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.options.subscribe_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options.command_timeout = timeout;
        self
    }

    /// Replaces every timing option at once.
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the settings and creates the [`SubscriptionManager`]. No
    /// connection is opened until [`SubscriptionManager::start`].
    pub fn build(self) -> Result<SubscriptionManager> {
        let url = Self::parse_url(&self.url)?;
        if self.connect_timeout.is_zero() {
            return Err(Error::Other("Connect timeout cannot be zero".to_string()));
        }
        // A zero read timeout is rejected by the socket.
        if self.poll_interval.is_zero() {
            return Err(Error::Other("Poll interval cannot be zero".to_string()));
        }

        let connector = WebsocketConnectorImpl::new(
            url,
            self.subprotocol,
            self.user_agent,
            self.connect_timeout,
            self.poll_interval,
        );
        Ok(SubscriptionManager::with_connector(
            connector,
            self.init_payload,
            self.options,
        ))
    }

    fn parse_url(url: &str) -> Result<Url> {
        let invalid = |reason: &str| Error::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(invalid("scheme must be 'ws' or 'wss'"));
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(invalid("missing host")),
        }
        Ok(parsed)
    }
}
