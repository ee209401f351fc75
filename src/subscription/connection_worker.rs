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

use std::collections::HashSet;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde_json::Value;
use tungstenite::Message;

use super::registry::SubscriptionRegistry;
use super::{ConnectionState, ManagerOptions, StartingReason};
use super::{Result, WorkerError};
use crate::network::serialization::{ClientMessage, Route, ServerMessage};
use crate::network::{NetworkError, Websocket, WebsocketConnector};
use crate::utils::Waitable;
use crate::SubscriptionId;

/// Requests sent from the [`SubscriptionManager`](crate::SubscriptionManager)
/// to the thread owning the connection.
#[derive(Debug)]
pub(crate) enum Command {
    /// Start the subscription (if not yet started) and notify `ack` once sent.
    Subscribe {
        id: SubscriptionId,
        ack: Sender<()>,
    },

    /// End the subscription and notify `ack` once the server has been told.
    Unsubscribe {
        id: SubscriptionId,
        ack: Sender<()>,
    },

    /// End every subscription, close the connection and finish the thread.
    Stop,
}

/// What the connection loop does after handling one event.
#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Reconnect(StartingReason),
    Terminate,
}

/// One websocket connection and the bookkeeping that lives as long as it does.
struct Session<WS: Websocket> {
    socket: WS,
    /// Subscriptions already started on this connection.
    started: HashSet<SubscriptionId>,
    idle_periods: u32,
    last_activity: Instant,
    ping_sent_at: Option<Instant>,
}

impl<WS: Websocket> Session<WS> {
    fn new(socket: WS) -> Self {
        Self {
            socket,
            started: HashSet::new(),
            idle_periods: 0,
            last_activity: Instant::now(),
            ping_sent_at: None,
        }
    }

    fn data_received(&mut self) {
        self.idle_periods = 0;
        self.last_activity = Instant::now();
    }
}

pub(crate) struct ConnectionWorker<C: WebsocketConnector> {
    connector: Arc<C>,
    init_payload: Value,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    state: Waitable<ConnectionState>,
    options: ManagerOptions,
}

impl<C: WebsocketConnector> ConnectionWorker<C> {
    pub(crate) fn new(
        connector: Arc<C>,
        init_payload: Value,
        registry: Arc<Mutex<SubscriptionRegistry>>,
        state: Waitable<ConnectionState>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            connector,
            init_payload,
            registry,
            state,
            options,
        }
    }

    /// Executes [`ConnectionWorker::run_internal`] and forwards its result. When this method returns,
    /// the state is [`ConnectionState::Stopped`] after a graceful exit and
    /// [`ConnectionState::Defunct`] otherwise.
    pub(crate) fn run(&self, commands: Receiver<Command>) -> Result<()> {
        let result = self.run_internal(&commands);
        let final_state = match &result {
            Ok(()) => ConnectionState::Stopped,
            Err(e) => {
                error!("Connection thread finished with error: {e}");
                ConnectionState::Defunct(result.clone())
            }
        };
        if let Err(e) = self.state.set(final_state) {
            error!("Cannot publish final connection state: {e}");
        }
        result
    }

    /// Executes an _endless_ loop implementing the following behaviour:
    /// 1. Connects to the websocket and sends the `init` message
    /// 2. Starts every registered subscription
    /// 3. Serves commands and messages coming from the websocket
    ///
    /// Whenever the connection is lost it waits [`ManagerOptions::reconnect_delay`] and
    /// goes back to 1. The loop finishes when:
    /// * it receives [`Command::Stop`] or the command channel is disconnected.
    /// * it happens any unrecoverable error (see [`ConnectionWorker::recoverable_error`])
    fn run_internal(&self, commands: &Receiver<Command>) -> Result<()> {
        let mut reason = StartingReason::Initializing;
        loop {
            self.state.set(ConnectionState::Starting(reason.clone()))?;
            debug!("Starting, reason: {reason}");

            let flow = match self.open_session()? {
                Some(mut session) => self.serve(&mut session, commands)?,
                None => Flow::Reconnect(StartingReason::ConnectionFailed),
            };
            match flow {
                Flow::Reconnect(next_reason) => reason = next_reason,
                Flow::Terminate | Flow::Continue => return Ok(()),
            }

            debug!("Reconnecting to server.");
            if self.wait_before_reconnect(commands) == Flow::Terminate {
                return Ok(());
            }
        }
    }

    /// Connects and initializes a new connection. Returns `None` if it failed
    /// for a reason worth retrying.
    fn open_session(&self) -> Result<Option<Session<C::Socket>>> {
        let mut socket = match self.connector.connect() {
            Ok(socket) => socket,
            Err(e) => {
                debug!("Failed to connect. Reconnecting... ({e})");
                Self::recoverable_error(e)?;
                return Ok(None);
            }
        };

        let init = ClientMessage::Init {
            payload: &self.init_payload,
        };
        if let Err(e) = socket.send_msg(Self::encode(&init)?) {
            debug!("Failed to send init message. Reconnecting... ({e})");
            return Ok(None);
        }

        info!("Running");
        self.state.set(ConnectionState::Running)?;
        Ok(Some(Session::new(socket)))
    }

    fn serve<WS: Websocket>(
        &self,
        session: &mut Session<WS>,
        commands: &Receiver<Command>,
    ) -> Result<Flow> {
        let flow = self.start_pending_subscriptions(session)?;
        if flow != Flow::Continue {
            return Ok(flow);
        }

        loop {
            let flow = match commands.try_recv() {
                Ok(command) => self.handle_command(session, command)?,
                Err(TryRecvError::Empty) => self.handle_websocket_message(session)?,
                Err(TryRecvError::Disconnected) => {
                    debug!("Manager is gone, closing the connection.");
                    Self::close(session);
                    Flow::Terminate
                }
            };
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }
    }

    /// Sends `subscription_start` for every registered subscription that has not been
    /// started on this connection yet.
    fn start_pending_subscriptions<WS: Websocket>(
        &self,
        session: &mut Session<WS>,
    ) -> Result<Flow> {
        let pending: Vec<(SubscriptionId, String)> = {
            let registry = self.registry.lock()?;
            registry
                .ids()
                .into_iter()
                .filter(|id| !session.started.contains(id))
                .filter_map(|id| registry.query(id).map(|query| (id, query)))
                .collect()
        };

        for (id, query) in pending {
            let message = ClientMessage::SubscriptionStart { query: &query, id };
            if let Err(e) = session.socket.send_msg(Self::encode(&message)?) {
                error!("Cannot start subscription {id}: {e}");
                return Ok(Flow::Reconnect(StartingReason::WebsocketError));
            }
            session.started.insert(id);
            debug!("New subscription {id}");
        }
        Ok(Flow::Continue)
    }

    fn handle_command<WS: Websocket>(
        &self,
        session: &mut Session<WS>,
        command: Command,
    ) -> Result<Flow> {
        match command {
            Command::Subscribe { id, ack } => {
                let flow = self.start_pending_subscriptions(session)?;
                if session.started.contains(&id) {
                    let _ = ack.send(());
                }
                Ok(flow)
            }
            Command::Unsubscribe { id, ack } => {
                let message = ClientMessage::SubscriptionEnd { id };
                if let Err(e) = session.socket.send_msg(Self::encode(&message)?) {
                    error!("Cannot end subscription {id}: {e}");
                    return Ok(Flow::Reconnect(StartingReason::WebsocketError));
                }
                self.registry.lock()?.remove(id);
                session.started.remove(&id);
                let _ = ack.send(());
                Ok(Flow::Continue)
            }
            Command::Stop => {
                self.shutdown(session)?;
                Ok(Flow::Terminate)
            }
        }
    }

    /// Ends every subscription on the server and closes the connection.
    fn shutdown<WS: Websocket>(&self, session: &mut Session<WS>) -> Result<()> {
        debug!("Stopping client.");
        let ids = self.registry.lock()?.ids();
        for id in ids {
            debug!("Sending unsubscribe: {id}");
            let message = ClientMessage::SubscriptionEnd { id };
            if let Err(e) = session.socket.send_msg(Self::encode(&message)?) {
                warn!("Websocket is closed. ({e})");
                break;
            }
            self.registry.lock()?.remove(id);
        }
        Self::close(session);
        debug!("Server connection is stopped");
        Ok(())
    }

    fn close<WS: Websocket>(session: &mut Session<WS>) {
        if let Err(e) = session.socket.close() {
            debug!("Error while closing the websocket: {e}");
        }
    }

    /// Reads a message from the socket and executes the associated behaviour:
    ///  * Data messages are routed to the subscription callbacks.
    ///  * Read timeouts feed the keep-alive logic (see [`ConnectionWorker::check_idle`]).
    ///  * A closed connection or any read error asks for a reconnection.
    fn handle_websocket_message<WS: Websocket>(&self, session: &mut Session<WS>) -> Result<Flow> {
        match session.socket.read_msg() {
            Ok(Message::Text(text)) => {
                session.data_received();
                self.process_message(text.as_str())?;
                Ok(Flow::Continue)
            }
            Ok(Message::Binary(bytes)) => {
                session.data_received();
                match std::str::from_utf8(&bytes) {
                    Ok(text) => self.process_message(text)?,
                    Err(_) => warn!("Ignoring binary message that is not UTF-8"),
                }
                Ok(Flow::Continue)
            }
            Ok(Message::Pong(_)) => {
                session.ping_sent_at = None;
                Ok(Flow::Continue)
            }
            Ok(Message::Close(_)) => {
                debug!("Server closed the connection.");
                Ok(Flow::Reconnect(StartingReason::WebsocketClosed))
            }
            Ok(_) => Ok(Flow::Continue),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(self.check_idle(session))
            }
            Err(e) => {
                error!("Connection error: {e}");
                Ok(Flow::Reconnect(StartingReason::WebsocketError))
            }
        }
    }

    /// Keep-alive: pings the server after [`ManagerOptions::idle_timeout`] without data and
    /// reconnects after more than [`ManagerOptions::max_idle_periods`] of those, or when a
    /// ping is not answered within [`ManagerOptions::pong_timeout`].
    fn check_idle<WS: Websocket>(&self, session: &mut Session<WS>) -> Flow {
        let now = Instant::now();
        if let Some(ping_sent_at) = session.ping_sent_at {
            if now.duration_since(ping_sent_at) >= self.options.pong_timeout {
                warn!("Ping not answered, reconnecting.");
                return Flow::Reconnect(StartingReason::PongTimeout);
            }
        }

        if now.duration_since(session.last_activity) < self.options.idle_timeout {
            return Flow::Continue;
        }

        session.idle_periods += 1;
        if session.idle_periods > self.options.max_idle_periods {
            debug!("No data, reconnecting.");
            return Flow::Reconnect(StartingReason::NoData);
        }

        debug!("No websocket data, sending a ping.");
        session.last_activity = now;
        if let Err(e) = session.socket.send_msg(Message::Ping(tungstenite::Bytes::new())) {
            error!("Cannot send ping: {e}");
            return Flow::Reconnect(StartingReason::WebsocketError);
        }
        if session.ping_sent_at.is_none() {
            session.ping_sent_at = Some(now);
        }
        Flow::Continue
    }

    /// Routes a message from the server to the callback of its subscription.
    fn process_message(&self, text: &str) -> Result<()> {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring message that cannot be parsed ({e}): {text}");
                return Ok(());
            }
        };

        match message.route() {
            Route::InitFail => warn!("init_fail: the server rejected the init payload"),
            Route::NoId | Route::NoPayload => {}
            Route::Complete(id) => debug!("Unsubscribe {id} successfully."),
            Route::InvalidId(id) => warn!("Unknown id {id}."),
            Route::Data { id, payload } => {
                // The lock is released before calling back, callbacks may use the manager.
                let callback = self.registry.lock()?.callback(id);
                match callback {
                    None => warn!("Unknown id {id}."),
                    Some(callback) => {
                        if panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                            error!("Callback for subscription {id} panicked");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Sleeps [`ManagerOptions::reconnect_delay`] while still listening to commands.
    /// Nothing can be sent meanwhile: subscriptions will be started after reconnecting and
    /// unsubscriptions are dropped (their `ack` is never notified).
    fn wait_before_reconnect(&self, commands: &Receiver<Command>) -> Flow {
        // No deadline when the delay does not fit in an Instant
        let deadline = Instant::now().checked_add(self.options.reconnect_delay);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let command = match remaining {
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => return Flow::Terminate,
                },
                Some(remaining) if remaining.is_zero() => match commands.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => return Flow::Continue,
                    Err(TryRecvError::Disconnected) => return Flow::Terminate,
                },
                Some(remaining) => match commands.recv_timeout(remaining) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => return Flow::Continue,
                    Err(RecvTimeoutError::Disconnected) => return Flow::Terminate,
                },
            };

            match command {
                Command::Stop => {
                    warn!("Websocket is closed, subscriptions cannot be ended on the server.");
                    return Flow::Terminate;
                }
                Command::Unsubscribe { id, .. } => {
                    warn!("Websocket is closed, cannot unsubscribe {id}.")
                }
                Command::Subscribe { .. } => {}
            }
        }
    }

    fn encode(message: &ClientMessage) -> Result<Message> {
        message
            .to_message()
            .map_err(|e| WorkerError::UnrecoverableError(format!("Cannot encode message: {e}")))
    }

    /// Whether the [`NetworkError`] will be permanent (it depends on static data) or we
    /// want to keep running the thread in case it eventually succeeds
    fn recoverable_error(error: NetworkError) -> Result<()> {
        match error {
            NetworkError::TungsteniteError(tungstenite::Error::Url(e)) => {
                Err(WorkerError::UnrecoverableError(e.to_string()))
            }
            NetworkError::TungsteniteError(_) => Ok(()),
            NetworkError::IoError(_) => Ok(()),
            NetworkError::ConnectTimeout => Ok(()),
            NetworkError::ContactToServerLost => Ok(()),
            e @ NetworkError::UrlParseError(_) => {
                Err(WorkerError::UnrecoverableError(e.to_string()))
            }
            e @ NetworkError::InvalidHeaderValue(_) => {
                Err(WorkerError::UnrecoverableError(e.to_string()))
            }
            NetworkError::CannotAcquireLock => Err(WorkerError::CannotAcquireLock),
        }
    }
}
