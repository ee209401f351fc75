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

//! Channel driven doubles of the network layer. Tests play the server role
//! and decide the outcome of every connection attempt.

use std::io::ErrorKind;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tungstenite::Message;

use crate::network::{NetworkError, NetworkResult, Websocket, WebsocketConnector};

const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(10);
const SERVER_WAIT: Duration = Duration::from_secs(5);

/// Client side of an in-memory websocket. Reads time out every few
/// milliseconds just like a real socket configured with a read timeout.
#[derive(Debug)]
pub struct MockWebsocket {
    incoming: Receiver<tungstenite::Result<Message>>,
    outgoing: Sender<Message>,
}

/// Server side of a [`MockWebsocket`].
#[derive(Debug)]
pub struct MockServerEnd {
    pub to_client: Sender<tungstenite::Result<Message>>,
    pub from_client: Receiver<Message>,
}

pub fn mock_websocket() -> (MockWebsocket, MockServerEnd) {
    let (to_client, incoming) = mpsc::channel();
    let (outgoing, from_client) = mpsc::channel();
    (
        MockWebsocket { incoming, outgoing },
        MockServerEnd {
            to_client,
            from_client,
        },
    )
}

impl MockServerEnd {
    pub fn send(&self, message: tungstenite::Result<Message>) {
        self.to_client
            .send(message)
            .expect("client side of the mock websocket is gone");
    }

    pub fn send_json(&self, value: Value) {
        self.send(Ok(Message::text(value.to_string())));
    }

    /// Next message sent by the client, whatever its kind.
    pub fn next_message(&self) -> Message {
        self.from_client
            .recv_timeout(SERVER_WAIT)
            .expect("client did not send any message")
    }

    /// Next text message sent by the client parsed as JSON. Pings are skipped.
    pub fn next_json(&self) -> Value {
        loop {
            match self.next_message() {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("client sent invalid JSON")
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("Unexpected message from client: {other:?}"),
            }
        }
    }

    /// Whether the client stays silent (pings aside) for `duration`.
    pub fn is_silent_for(&self, duration: Duration) -> bool {
        let deadline = std::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.from_client.recv_timeout(remaining) {
                Ok(Message::Ping(_)) => continue,
                Ok(_) => return false,
                Err(_) => return true,
            }
        }
    }
}

impl Websocket for MockWebsocket {
    fn read_msg(&mut self) -> tungstenite::Result<Message> {
        match self.incoming.recv_timeout(MOCK_READ_TIMEOUT) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                Err(tungstenite::Error::Io(ErrorKind::WouldBlock.into()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(tungstenite::Error::ConnectionClosed),
        }
    }

    fn send_msg(&mut self, message: Message) -> tungstenite::Result<()> {
        self.outgoing
            .send(message)
            .map_err(|_| tungstenite::Error::AlreadyClosed)
    }

    fn close(&mut self) -> tungstenite::Result<()> {
        self.send_msg(Message::Close(None))
    }
}

/// A connector that blocks on every connection attempt until the test
/// decides its outcome through the paired [`MockConnectorControl`].
#[derive(Debug)]
pub struct MockConnector {
    sockets: Mutex<Receiver<NetworkResult<MockWebsocket>>>,
}

#[derive(Debug, Clone)]
pub struct MockConnectorControl {
    sender: Sender<NetworkResult<MockWebsocket>>,
}

pub fn mock_connector() -> (MockConnector, MockConnectorControl) {
    let (sender, receiver) = mpsc::channel();
    (
        MockConnector {
            sockets: Mutex::new(receiver),
        },
        MockConnectorControl { sender },
    )
}

impl MockConnectorControl {
    /// Lets the next connection attempt succeed.
    pub fn accept(&self) -> MockServerEnd {
        let (websocket, server_end) = mock_websocket();
        self.sender
            .send(Ok(websocket))
            .expect("connector is gone");
        server_end
    }

    /// Makes the next connection attempt fail.
    pub fn refuse(&self, error: NetworkError) {
        self.sender.send(Err(error)).expect("connector is gone");
    }
}

impl WebsocketConnector for MockConnector {
    type Socket = MockWebsocket;

    fn connect(&self) -> NetworkResult<MockWebsocket> {
        let sockets = self.sockets.lock()?;
        match sockets.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(NetworkError::ContactToServerLost),
        }
    }
}
