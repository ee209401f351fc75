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

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use log::debug;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, Message, WebSocket};
use url::Url;

use super::{NetworkError, NetworkResult};

pub(crate) const DEFAULT_SUBPROTOCOL: &str = "graphql-subscriptions";
pub(crate) const USER_AGENT_HEADER: &str = "User-Agent";
const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// The subset of a websocket the connection worker needs.
///
/// Reads are expected to time out periodically (returning an IO error of kind
/// [`ErrorKind::WouldBlock`] or [`ErrorKind::TimedOut`]) so the owner of the
/// socket gets a chance to do some work between messages.
pub trait Websocket {
    fn read_msg(&mut self) -> tungstenite::Result<Message>;

    fn send_msg(&mut self, message: Message) -> tungstenite::Result<()>;

    /// Starts the closing handshake and waits (for a bounded time) for the
    /// server to finish it.
    fn close(&mut self) -> tungstenite::Result<()>;
}

impl Websocket for WebSocket<MaybeTlsStream<TcpStream>> {
    fn read_msg(&mut self) -> tungstenite::Result<Message> {
        self.read()
    }

    fn send_msg(&mut self, message: Message) -> tungstenite::Result<()> {
        self.send(message)
    }

    fn close(&mut self) -> tungstenite::Result<()> {
        WebSocket::close(self, None)?;
        let deadline = Instant::now() + CLOSE_HANDSHAKE_TIMEOUT;
        while Instant::now() < deadline {
            match self.read() {
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
        Err(tungstenite::Error::Io(std::io::Error::new(
            ErrorKind::TimedOut,
            "server did not complete the closing handshake",
        )))
    }
}

/// Opens websockets to the GraphQL server.
pub trait WebsocketConnector: Send + Sync + 'static {
    type Socket: Websocket;

    fn connect(&self) -> NetworkResult<Self::Socket>;
}

#[derive(Debug, Clone)]
pub struct WebsocketConnectorImpl {
    url: Url,
    subprotocol: String,
    user_agent: Option<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WebsocketConnectorImpl {
    /// Creates a connector for the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - A `ws://` or `wss://` endpoint.
    /// * `subprotocol` - Value requested in the `Sec-WebSocket-Protocol` header.
    /// * `user_agent` - Optional value for the `User-Agent` header.
    /// * `connect_timeout` - Upper bound for the TCP connection plus the handshake.
    /// * `read_timeout` - How long a single read blocks before giving control back.
    pub fn new(
        url: Url,
        subprotocol: String,
        user_agent: Option<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            url,
            subprotocol,
            user_agent,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn build_request(&self) -> NetworkResult<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            SUBPROTOCOL_HEADER,
            self.subprotocol
                .parse()
                .map_err(|_| NetworkError::InvalidHeaderValue(SUBPROTOCOL_HEADER.to_string()))?,
        );
        if let Some(user_agent) = &self.user_agent {
            headers.insert(
                USER_AGENT_HEADER,
                user_agent
                    .parse()
                    .map_err(|_| NetworkError::InvalidHeaderValue(USER_AGENT_HEADER.to_string()))?,
            );
        }
        Ok(request)
    }

    fn open_tcp_stream(&self) -> NetworkResult<TcpStream> {
        let addresses = self.url.socket_addrs(|| None)?;
        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Cannot connect to {address}: {e}");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if e.kind() == ErrorKind::TimedOut => Err(NetworkError::ConnectTimeout),
            Some(e) => Err(e.into()),
            None => Err(NetworkError::UrlParseError(self.url.to_string())),
        }
    }
}

impl WebsocketConnector for WebsocketConnectorImpl {
    type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

    fn connect(&self) -> NetworkResult<Self::Socket> {
        let request = self.build_request()?;
        let stream = self.open_tcp_stream()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.connect_timeout))?;

        // Socket options are shared between clones, this one is kept to adjust
        // the timeout once the stream has been moved into the websocket.
        let control = stream.try_clone()?;

        let socket = match tungstenite::client_tls(request, stream) {
            Ok((socket, _response)) => socket,
            Err(HandshakeError::Failure(e)) => return Err(e.into()),
            Err(HandshakeError::Interrupted(_)) => return Err(NetworkError::ConnectTimeout),
        };
        control.set_read_timeout(Some(self.read_timeout))?;
        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(url: &str, user_agent: Option<&str>) -> WebsocketConnectorImpl {
        WebsocketConnectorImpl::new(
            Url::parse(url).unwrap(),
            DEFAULT_SUBPROTOCOL.to_string(),
            user_agent.map(String::from),
            Duration::from_secs(1),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_request_headers() {
        let request = connector("wss://example.com/gql", Some("my-agent/1.0"))
            .build_request()
            .unwrap();
        let headers = request.headers();
        assert_eq!(headers[SUBPROTOCOL_HEADER], "graphql-subscriptions");
        assert_eq!(headers[USER_AGENT_HEADER], "my-agent/1.0");
        assert_eq!(request.uri().to_string(), "wss://example.com/gql");
    }

    #[test]
    fn test_request_without_user_agent() {
        let request = connector("ws://example.com/gql", None)
            .build_request()
            .unwrap();
        assert!(request.headers().get(USER_AGENT_HEADER).is_none());
    }

    #[test]
    fn test_invalid_user_agent() {
        let r = connector("ws://example.com/gql", Some("bad\nagent")).build_request();
        assert!(
            matches!(r, Err(NetworkError::InvalidHeaderValue(ref h)) if h == USER_AGENT_HEADER),
            "{r:?}"
        );
    }

    #[test]
    fn test_connection_refused() {
        // Bind and drop to get a port where nobody is listening.
        let port = {
            let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
            listener.local_addr().unwrap().port()
        };
        let r = connector(&format!("ws://127.0.0.1:{port}/gql"), None).connect();
        assert!(matches!(r, Err(NetworkError::IoError(_))));
    }
}
