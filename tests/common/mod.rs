#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::thread::sleep;
use std::time::{Duration, Instant};

use graphql_subscription_manager::{ConnectionState, SubscriptionManager};
use serde_json::Value;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::{Message, WebSocket};

pub const WAIT: Duration = Duration::from_secs(5);

/// Headers the client sent in the websocket handshake.
#[derive(Debug, Default)]
pub struct Handshake {
    pub path: String,
    pub subprotocol: Option<String>,
    pub user_agent: Option<String>,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bind() -> (TcpListener, String) {
    let server = TcpListener::bind(("127.0.0.1", 0)).expect("Failed to bind");
    let port = server.local_addr().unwrap().port();
    (server, format!("ws://127.0.0.1:{port}/v1/gql/subscriptions"))
}

/// Accepts the next connection and completes the handshake, agreeing on
/// the sub-protocol requested by the client.
pub fn handle_websocket(server: &TcpListener) -> (WebSocket<TcpStream>, Handshake) {
    let (stream, _) = server.accept().unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();

    let mut handshake = Handshake::default();
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        handshake.path = request.uri().path().to_string();
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        handshake.user_agent = header("User-Agent");
        if let Some(protocol) = request.headers().get("Sec-WebSocket-Protocol") {
            handshake.subprotocol = header("Sec-WebSocket-Protocol");
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", protocol.clone());
        }
        Ok(response)
    };
    let websocket = tungstenite::accept_hdr(stream, callback).unwrap();
    (websocket, handshake)
}

/// Accepts the next connection and answers garbage instead of a handshake.
pub fn handle_websocket_error(server: &TcpListener) {
    use std::io::Write;
    let (mut stream, _) = server.accept().unwrap();
    stream.write_all(b"not today").unwrap();
}

/// Next text message from the client. Pings are answered by tungstenite
/// while reading and skipped here.
pub fn read_json(websocket: &mut WebSocket<TcpStream>) -> Value {
    loop {
        match websocket.read().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected message from client: {other:?}"),
        }
    }
}

/// Text messages received until the client closes the connection.
pub fn read_until_close(mut websocket: WebSocket<TcpStream>) -> (Vec<Value>, bool) {
    let mut messages = Vec::new();
    loop {
        match websocket.read() {
            Ok(Message::Text(text)) => messages.push(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) => continue,
            Ok(_) => continue,
            Err(tungstenite::Error::ConnectionClosed) => return (messages, true),
            Err(_) => return (messages, false),
        }
    }
}

pub fn send_json(websocket: &mut WebSocket<TcpStream>, value: Value) {
    websocket.send(Message::text(value.to_string())).unwrap();
}

pub fn wait_for_state(manager: &SubscriptionManager, condition: impl Fn(&ConnectionState) -> bool) -> ConnectionState {
    let deadline = Instant::now() + WAIT;
    loop {
        let state = manager.get_state().unwrap();
        if condition(&state) {
            return state;
        }
        if Instant::now() > deadline {
            panic!("Timed out, connection state is {state:?}");
        }
        sleep(Duration::from_millis(10));
    }
}
