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

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;

use super::connection_worker::{Command, ConnectionWorker};
use super::registry::SubscriptionRegistry;
use super::thread_handle::{ThreadHandle, ThreadStatus};
use super::{ConnectionState, ManagerOptions, StartingReason};
use crate::builders::SubscriptionManagerBuilder;
use crate::errors::{Error, Result};
use crate::network::{WebsocketConnector, WebsocketConnectorImpl};
use crate::utils::Waitable;
use crate::SubscriptionId;

/// Multiplexes GraphQL subscriptions over one websocket connection.
///
/// The connection is served by a background thread created in
/// [`SubscriptionManager::start`]. Every method takes `&self`, so the manager
/// can be shared between threads (for example inside an [`Arc`]) and it can
/// be used from the subscription callbacks themselves.
pub struct SubscriptionManager<C: WebsocketConnector = WebsocketConnectorImpl> {
    connector: Arc<C>,
    init_payload: Value,
    options: ManagerOptions,

    /// Shared with the connection thread, which starts every entry on each new connection.
    registry: Arc<Mutex<SubscriptionRegistry>>,

    /// Published by the connection thread.
    state: Waitable<ConnectionState>,

    worker: Mutex<Option<ThreadHandle<Command>>>,

    /// Id of the connection thread, kept until the thread has been joined.
    worker_thread: Mutex<Option<ThreadId>>,

    /// Serializes [`SubscriptionManager::start`] and [`SubscriptionManager::stop`].
    lifecycle: Mutex<()>,
}

impl SubscriptionManager<WebsocketConnectorImpl> {
    /// Creates a manager for `url` using the default settings. The connection
    /// is not opened until [`SubscriptionManager::start`] is called.
    ///
    /// # Arguments
    ///
    /// * `init_payload` - Sent to the server in the `init` message of every connection.
    /// * `url` - A `ws://` or `wss://` endpoint.
    pub fn new(init_payload: Value, url: &str) -> Result<Self> {
        Self::builder(url).init_payload(init_payload).build()
    }

    /// Returns a builder to customize the connection before creating the manager.
    pub fn builder(url: &str) -> SubscriptionManagerBuilder {
        SubscriptionManagerBuilder::new(url)
    }
}

impl<C: WebsocketConnector> SubscriptionManager<C> {
    /// Creates a manager that opens its connections using `connector`.
    pub fn with_connector(connector: C, init_payload: Value, options: ManagerOptions) -> Self {
        Self {
            connector: Arc::new(connector),
            init_payload,
            options,
            registry: Arc::new(Mutex::new(SubscriptionRegistry::default())),
            state: Waitable::new(ConnectionState::Stopped),
            worker: Mutex::new(None),
            worker_thread: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Starts the thread that connects to the server and keeps the connection
    /// alive. Subscriptions registered so far are started as soon as the
    /// connection is established.
    ///
    /// Does nothing if the thread is already running. A thread that finished
    /// (after [`SubscriptionManager::stop`] or because of an unrecoverable
    /// error) is replaced by a new one.
    pub fn start(&self) -> Result<()> {
        // Called from a callback: the thread is alive, and a concurrent stop()
        // may be waiting for this callback to return.
        if self.on_worker_thread()? {
            debug!("Connection thread is already running");
            return Ok(());
        }
        let _lifecycle = self.lifecycle.lock()?;
        let mut worker = self.worker.lock()?;

        if let Some(handle) = worker.as_mut() {
            if handle.get_thread_status() == ThreadStatus::Running {
                debug!("Connection thread is already running");
                return Ok(());
            }
        }
        if let Some(handle) = worker.take() {
            if let ThreadStatus::Finished(Err(e)) = handle.join() {
                debug!("Previous connection thread finished with error: {e}");
            }
        }

        self.state
            .set(ConnectionState::Starting(StartingReason::Initializing))?;
        let connection = ConnectionWorker::new(
            self.connector.clone(),
            self.init_payload.clone(),
            self.registry.clone(),
            self.state.clone(),
            self.options.clone(),
        );
        let handle = ThreadHandle::new(move |commands| connection.run(commands));
        *self.worker_thread.lock()? = handle.thread_id();
        *worker = Some(handle);
        info!("Subscription manager started");
        Ok(())
    }

    /// Whether the connection is established and initialized.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.state.get()?.is_running())
    }

    pub fn get_state(&self) -> Result<ConnectionState> {
        Ok(self.state.get()?)
    }

    /// Status of the connection thread, `None` if it was never started or it was stopped.
    pub fn get_thread_status(&self) -> Result<Option<ThreadStatus>> {
        Ok(self
            .worker
            .lock()?
            .as_mut()
            .map(|handle| handle.get_thread_status()))
    }

    /// Blocks until the connection is running or `timeout` elapses. Returns
    /// whether the connection is running.
    pub fn wait_until_running(&self, timeout: Duration) -> Result<bool> {
        let (_, running) = self.state.wait_until(timeout, ConnectionState::is_running)?;
        Ok(running)
    }

    /// Ids of the registered subscriptions, in allocation order.
    pub fn subscription_ids(&self) -> Result<Vec<SubscriptionId>> {
        Ok(self.registry.lock()?.ids())
    }

    /// Same as [`SubscriptionManager::subscribe_with_timeout`] using
    /// [`ManagerOptions::subscribe_timeout`].
    pub fn subscribe<F>(&self, query: &str, callback: F) -> Result<Option<SubscriptionId>>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.subscribe_with_timeout(query, callback, self.options.subscribe_timeout)
    }

    /// Registers a subscription. `callback` receives the `payload` of every
    /// message the server sends for it.
    ///
    /// Returns the id of the subscription once `subscription_start` has been
    /// sent, waiting up to `timeout` for the connection to be established.
    /// Returns `None` if that did not happen in time (or the manager is not
    /// started): the subscription stays registered and it is started as soon
    /// as the connection is up.
    ///
    /// Called from a callback, the subscription is queued without waiting and
    /// the id is returned if the connection is running.
    pub fn subscribe_with_timeout<F>(
        &self,
        query: &str,
        callback: F,
        timeout: Duration,
    ) -> Result<Option<SubscriptionId>>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        // None when the timeout does not fit in an Instant, i.e. wait forever
        let deadline = Instant::now().checked_add(timeout);
        let id = self
            .registry
            .lock()?
            .insert(query.to_string(), Arc::new(callback));
        debug!("Registered subscription {id}");

        if self.on_worker_thread()? {
            let (ack, _) = mpsc::channel();
            let queued = self.send_command(Command::Subscribe { id, ack })?;
            return Ok((queued && self.is_running()?).then_some(id));
        }

        // Stopped and defunct connections will not come up on their own
        let (state, _) = self
            .state
            .wait_until(timeout, |state| !matches!(state, ConnectionState::Starting(_)))?;
        if !state.is_running() {
            warn!("Connection is not running ({state:?}), subscription {id} is pending");
            return Ok(None);
        }

        let (ack, acked) = mpsc::channel();
        if !self.send_command(Command::Subscribe { id, ack })? {
            warn!("Connection thread is gone, subscription {id} is pending");
            return Ok(None);
        }
        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        match acked.recv_timeout(remaining) {
            Ok(()) => Ok(Some(id)),
            Err(_) => {
                warn!("Subscription {id} was not sent in time, it is pending");
                Ok(None)
            }
        }
    }

    /// Ends the subscription on the server and forgets it. The end message is
    /// sent even if the id is not registered.
    ///
    /// If the connection is not running the subscription is kept (it will be
    /// started again on the next connection) and a warning is logged.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        if !self.is_running()? {
            warn!("Websocket is closed.");
            return Ok(());
        }

        let (ack, acked) = mpsc::channel();
        if !self.send_command(Command::Unsubscribe { id, ack })? {
            warn!("Websocket is closed.");
            return Ok(());
        }
        if self.on_worker_thread()? {
            return Ok(());
        }
        if acked.recv_timeout(self.options.command_timeout).is_err() {
            warn!("Subscription {id} could not be ended");
        }
        Ok(())
    }

    /// Ends every subscription on the server, closes the connection and waits
    /// for the connection thread to finish.
    ///
    /// Subscriptions that could not be ended (because the connection was down)
    /// stay registered and are started again if the manager is restarted.
    /// It cannot be called from a subscription callback.
    pub fn stop(&self) -> Result<()> {
        if self.on_worker_thread()? {
            return Err(Error::Other(
                "The manager cannot be stopped from a subscription callback".to_string(),
            ));
        }
        let _lifecycle = self.lifecycle.lock()?;

        let handle = self.worker.lock()?.take();
        if let Some(handle) = handle {
            debug!("Stopping connection thread");
            let _ = handle.sender().send(Command::Stop);
            if let ThreadStatus::Finished(Err(e)) = handle.join() {
                debug!("Connection thread finished with error: {e}");
            }
        }
        *self.worker_thread.lock()? = None;
        self.state.set(ConnectionState::Stopped)?;
        info!("Subscription manager stopped");
        Ok(())
    }

    /// Returns whether the command reached the connection thread.
    fn send_command(&self, command: Command) -> Result<bool> {
        match &*self.worker.lock()? {
            Some(handle) => Ok(handle.sender().send(command).is_ok()),
            None => Ok(false),
        }
    }

    fn on_worker_thread(&self) -> Result<bool> {
        Ok(*self.worker_thread.lock()? == Some(std::thread::current().id()))
    }
}

impl<C: WebsocketConnector> std::fmt::Debug for SubscriptionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .finish()
    }
}
