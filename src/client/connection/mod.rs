// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The connection manager. It owns the secure channel to the server, the sessions created on it
//! and the state machine that opens, repairs and closes the channel.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{
        config::ClientConfig,
        process_unexpected_response,
        session::Session,
        transport::{ChannelEvent, ChannelFactory, ChannelOptions, SecureChannel},
        Error, IdentityToken,
    },
    core::{config::Config, supported_message::SupportedMessage},
    crypto::{CertificateManager, SelfSignedCertificateParams},
    sync::{Mutex, RwLock},
    types::{EndpointDescription, StatusCode},
};

mod clock;
mod endpoints;
mod reconnect;
pub mod registry;

pub use self::{
    clock::ClockAdjustment,
    reconnect::{ReconnectionHandler, SessionRepair},
};

macro_rules! connection_debug {
    ($connection: expr, $($arg:tt)*) =>  {
        debug!("connection {} {}", $connection.id(), format!($($arg)*));
    }
}
pub(crate) use connection_debug;

macro_rules! connection_info {
    ($connection: expr, $($arg:tt)*) =>  {
        info!("connection {} {}", $connection.id(), format!($($arg)*));
    }
}
pub(crate) use connection_info;

macro_rules! connection_warn {
    ($connection: expr, $($arg:tt)*) =>  {
        warn!("connection {} {}", $connection.id(), format!($($arg)*));
    }
}
pub(crate) use connection_warn;

macro_rules! connection_error {
    ($connection: expr, $($arg:tt)*) =>  {
        error!("connection {} {}", $connection.id(), format!($($arg)*));
    }
}
pub(crate) use connection_error;

/// State of the connection to the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The channel was lost and is being reopened.
    Reconnecting,
    /// A new channel is open and the sessions on it are being restored.
    ReconnectingNewChannelConnected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::ReconnectingNewChannelConnected => "reconnecting_newchannel_connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        write!(f, "{}", s)
    }
}

/// Notifications emitted by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    ConnectionLost,
    ConnectionReestablished,
    /// A channel could not be opened and the next attempt happens after `delay`.
    Backoff { retry_count: u32, delay: Duration },
    StartReconnection,
    ReconnectionAttemptHasFailed(String),
    AfterReconnection,
    Close(Option<StatusCode>),
    Abort,
    TimedOutRequest { request: &'static str },
    SecurityTokenRenewed { token_id: u32 },
    Lifetime75 { token_id: u32 },
    SendChunk(usize),
    ReceiveChunk(usize),
    SendRequest {
        request: &'static str,
        request_handle: u32,
    },
    ReceiveResponse {
        response: &'static str,
        request_handle: u32,
    },
}

impl ConnectionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionEvent::Connected => "connected",
            ConnectionEvent::ConnectionLost => "connection_lost",
            ConnectionEvent::ConnectionReestablished => "connection_reestablished",
            ConnectionEvent::Backoff { .. } => "backoff",
            ConnectionEvent::StartReconnection => "start_reconnection",
            ConnectionEvent::ReconnectionAttemptHasFailed(_) => "reconnection_attempt_has_failed",
            ConnectionEvent::AfterReconnection => "after_reconnection",
            ConnectionEvent::Close(_) => "close",
            ConnectionEvent::Abort => "abort",
            ConnectionEvent::TimedOutRequest { .. } => "timed_out_request",
            ConnectionEvent::SecurityTokenRenewed { .. } => "security_token_renewed",
            ConnectionEvent::Lifetime75 { .. } => "lifetime_75",
            ConnectionEvent::SendChunk(_) => "send_chunk",
            ConnectionEvent::ReceiveChunk(_) => "receive_chunk",
            ConnectionEvent::SendRequest { .. } => "send_request",
            ConnectionEvent::ReceiveResponse { .. } => "receive_response",
        }
    }
}

/// Snapshot of the traffic counters of a connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatistics {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub transactions_performed: u64,
    pub timed_out_requests: u64,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    transactions_performed: AtomicU64,
    timed_out_requests: AtomicU64,
}

struct ReconnectionTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A connection to one server over at most one secure channel.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ClientConnection {
    id: u32,
    #[derivative(Debug = "ignore")]
    this: Weak<ClientConnection>,
    config: ClientConfig,
    #[derivative(Debug = "ignore")]
    channel_factory: Arc<dyn ChannelFactory>,
    #[derivative(Debug = "ignore")]
    certificate_manager: Arc<dyn CertificateManager>,
    state: watch::Sender<ConnectionState>,
    #[derivative(Debug = "ignore")]
    channel: RwLock<Option<Arc<dyn SecureChannel>>>,
    /// The endpoint selected when the server certificate was fetched.
    endpoint: RwLock<Option<EndpointDescription>>,
    server_endpoints: RwLock<Vec<EndpointDescription>>,
    server_certificate: RwLock<Option<Vec<u8>>>,
    /// Set when the next reconnection attempt must fetch the server certificate again.
    refetch_server_certificate: AtomicBool,
    sessions: Mutex<Vec<Arc<Session>>>,
    #[derivative(Debug = "ignore")]
    events: broadcast::Sender<ConnectionEvent>,
    #[derivative(Debug = "ignore")]
    reconnection: Mutex<Option<ReconnectionTask>>,
    #[derivative(Debug = "ignore")]
    reconnection_handler: RwLock<Arc<dyn ReconnectionHandler>>,
    counters: Counters,
    clock: ClockAdjustment,
    #[derivative(Debug = "ignore")]
    clock_timer: Mutex<Option<JoinHandle<()>>>,
    #[derivative(Debug = "ignore")]
    channel_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ClientConnection {
    /// Creates a disconnected connection from a valid configuration.
    pub fn new(
        config: ClientConfig,
        channel_factory: Arc<dyn ChannelFactory>,
        certificate_manager: Arc<dyn CertificateManager>,
    ) -> Result<Arc<Self>, Error> {
        if !config.is_valid() {
            return Err(Error::Configuration(
                "client configuration is invalid".to_string(),
            ));
        }
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let clock_enabled = config.clock_adjustment_interval().is_some();
        Ok(Arc::new_cyclic(|this| ClientConnection {
            id: registry::next_connection_id(),
            this: this.clone(),
            config,
            channel_factory,
            certificate_manager,
            state,
            channel: RwLock::new(None),
            endpoint: RwLock::new(None),
            server_endpoints: RwLock::new(Vec::new()),
            server_certificate: RwLock::new(None),
            refetch_server_certificate: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            events,
            reconnection: Mutex::new(None),
            reconnection_handler: RwLock::new(Arc::new(SessionRepair)),
            counters: Counters::default(),
            clock: ClockAdjustment::new(clock_enabled),
            clock_timer: Mutex::new(None),
            channel_watcher: Mutex::new(None),
        }))
    }

    /// The process-local id of the connection, used to label log output.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the connection reaches `state`. Returns false if the connection is dropped
    /// first.
    pub async fn wait_for_state(&self, state: ConnectionState) -> bool {
        let mut rx = self.state.subscribe();
        let reached = rx.wait_for(|s| *s == state).await.is_ok();
        reached
    }

    /// Receives the events emitted by the connection from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Reconnecting | ConnectionState::ReconnectingNewChannelConnected
        )
    }

    pub fn statistics(&self) -> ConnectionStatistics {
        ConnectionStatistics {
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            transactions_performed: self.counters.transactions_performed.load(Ordering::Relaxed),
            timed_out_requests: self.counters.timed_out_requests.load(Ordering::Relaxed),
        }
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        trace_lock!(self.sessions).clone()
    }

    /// Replaces the hook invoked once a lost channel has been reopened. The default hook
    /// repairs every session of the connection.
    pub fn set_reconnection_handler(&self, handler: Arc<dyn ReconnectionHandler>) {
        *trace_write_lock!(self.reconnection_handler) = handler;
    }

    /// The server certificate, once it is known.
    pub fn server_certificate(&self) -> Option<Vec<u8>> {
        trace_read_lock!(self.server_certificate).clone()
    }

    /// The endpoint selected when the server certificate was fetched.
    pub fn endpoint(&self) -> Option<EndpointDescription> {
        trace_read_lock!(self.endpoint).clone()
    }

    /// The current time according to the server clock.
    pub fn adjusted_now(&self) -> crate::types::DateTime {
        self.clock.adjusted_now()
    }

    pub(crate) fn clock(&self) -> &ClockAdjustment {
        &self.clock
    }

    pub(crate) fn certificate_manager(&self) -> &Arc<dyn CertificateManager> {
        &self.certificate_manager
    }

    pub(crate) fn channel(&self) -> Option<Arc<dyn SecureChannel>> {
        trace_read_lock!(self.channel).clone()
    }

    /// True while a channel is installed and open.
    pub fn is_channel_valid(&self) -> bool {
        self.channel().is_some_and(|c| c.is_opened())
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        // No receivers is not an error
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            connection_debug!(self, "state {} -> {}", previous, state);
        }
    }

    /// Moves from `from` to `to` if the connection is in state `from`.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        });
        if changed {
            connection_debug!(self, "state {} -> {}", from, to);
        }
        changed
    }

    /// Connects to the server. When the configured security requires it, the client's own
    /// certificate is created and the server certificate fetched and verified before the channel
    /// is opened. Opening the channel is retried according to the connection strategy, the
    /// connect as a whole is not.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The connection is `Connected`.
    /// * `Err(Error)` - The connection is `Disconnected` again and the error tells why.
    ///
    pub async fn connect(&self) -> Result<(), Error> {
        self.begin_connect()?;
        let result = async {
            if self.config.requires_security() {
                self.ensure_own_certificate()?;
                if self.server_certificate().is_none() {
                    self.fetch_server_certificate().await?;
                }
            }
            self.open_first_channel().await
        }
        .await;
        self.complete_connect(result)
    }

    /// Connects without any certificate exchange, used to discover the endpoints of the server.
    pub(crate) async fn open_discovery_channel(&self) -> Result<(), Error> {
        self.begin_connect()?;
        let result = self.open_first_channel().await;
        self.complete_connect(result)
    }

    fn begin_connect(&self) -> Result<(), Error> {
        let has_channel = trace_read_lock!(self.channel).is_some();
        if has_channel || !self.transition(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            let state = self.state();
            connection_error!(self, "cannot connect while {}", state);
            return Err(Error::InvalidState(format!(
                "cannot connect while {}",
                state
            )));
        }
        connection_info!(self, "connecting to {}", self.config.endpoint_url);
        Ok(())
    }

    fn complete_connect(&self, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                registry::register(self.id, self.this.clone());
                self.start_clock_timer();
                connection_info!(self, "connected to {}", self.config.endpoint_url);
                self.emit(ConnectionEvent::Connected);
                Ok(())
            }
            Err(err) => {
                connection_error!(self, "cannot connect to {}, {}", self.config.endpoint_url, err);
                if let Some(channel) = self.take_channel() {
                    channel.dispose();
                }
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    /// Opens the first channel, backing off between attempts as the connection strategy says.
    async fn open_first_channel(&self) -> Result<(), Error> {
        let options = self.channel_options();
        let mut backoff = self.config.connection_strategy.new_backoff();
        loop {
            match self.channel_factory.create(&options).await {
                Ok(channel) => {
                    self.install_channel(channel);
                    return Ok(());
                }
                Err(err) => {
                    connection_warn!(self, "cannot open a channel, {}", err);
                    let Some(delay) = backoff.next() else {
                        return Err(err.into());
                    };
                    self.emit(ConnectionEvent::Backoff {
                        retry_count: backoff.retry_count(),
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn ensure_own_certificate(&self) -> Result<(), Error> {
        if self.certificate_manager.own_certificate().is_some() {
            return Ok(());
        }
        connection_info!(self, "creating a self-signed client certificate");
        let params = SelfSignedCertificateParams::new(
            &self.config.application_uri,
            &self.config.application_name,
        );
        self.certificate_manager
            .create_self_signed_certificate(&params)
            .map(|_| ())
            .map_err(|status| {
                Error::Configuration(format!("cannot create the client certificate, {}", status))
            })
    }

    pub(crate) fn channel_options(&self) -> ChannelOptions {
        let endpoint_url = trace_read_lock!(self.endpoint)
            .as_ref()
            .map(|e| e.endpoint_url.clone())
            .unwrap_or_else(|| self.config.endpoint_url.clone());
        ChannelOptions {
            endpoint_url,
            security_policy: self.config.security_policy,
            security_mode: self.config.security_mode,
            client_certificate: self.certificate_manager.own_certificate(),
            server_certificate: self.server_certificate(),
            request_timeout: self.config.request_timeout(),
        }
    }

    /// Makes `channel` the channel of the connection and starts forwarding its events.
    fn install_channel(&self, channel: Arc<dyn SecureChannel>) {
        let events = channel.subscribe();
        let previous = trace_write_lock!(self.channel).replace(channel.clone());
        if let Some(previous) = previous {
            connection_warn!(self, "replacing a channel that was never torn down");
            previous.dispose();
        }
        let watcher = tokio::spawn(watch_channel(self.this.clone(), channel, events));
        if let Some(previous) = trace_lock!(self.channel_watcher).replace(watcher) {
            previous.abort();
        }
    }

    fn take_channel(&self) -> Option<Arc<dyn SecureChannel>> {
        if let Some(watcher) = trace_lock!(self.channel_watcher).take() {
            watcher.abort();
        }
        trace_write_lock!(self.channel).take()
    }

    /// Closes and disposes of the current channel, if any.
    async fn teardown_channel(&self) {
        if let Some(channel) = self.take_channel() {
            if channel.is_opened() {
                if let Err(status) = channel.close().await {
                    connection_debug!(self, "channel did not close cleanly, {}", status);
                }
            }
            channel.dispose();
        }
    }

    fn start_clock_timer(&self) {
        let Some(interval) = self.config.clock_adjustment_interval() else {
            return;
        };
        let connection = self.this.clone();
        let timer = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(connection) = connection.upgrade() else {
                    break;
                };
                connection.clock.adjust();
            }
        });
        if let Some(previous) = trace_lock!(self.clock_timer).replace(timer) {
            previous.abort();
        }
    }

    /// Called by the channel watcher when the current channel closes.
    fn on_channel_closed(&self, channel: &Arc<dyn SecureChannel>, error: Option<StatusCode>) {
        let is_current = self
            .channel()
            .is_some_and(|c| std::ptr::addr_eq(Arc::as_ptr(&c), Arc::as_ptr(channel)));
        if !is_current {
            return;
        }
        let Some(error) = error else {
            return;
        };
        connection_warn!(self, "channel was lost, {}", error);
        if self.config.reconnect_on_failure {
            self.start_reconnection();
        } else if self.transition(ConnectionState::Connected, ConnectionState::Disconnected) {
            if let Some(channel) = self.take_channel() {
                channel.dispose();
            }
            registry::unregister(self.id);
            self.stop_clock_timer();
            self.emit(ConnectionEvent::ConnectionLost);
        }
    }

    fn stop_clock_timer(&self) {
        if let Some(timer) = trace_lock!(self.clock_timer).take() {
            timer.abort();
        }
    }

    /// Sends a request over the channel, outside of any session. Traffic counters and the clock
    /// offset are updated from the transaction.
    pub(crate) async fn send_on_channel(
        &self,
        request: SupportedMessage,
        timeout: Duration,
    ) -> Result<SupportedMessage, Error> {
        let request_name = request.type_name();
        let Some(channel) = self.channel() else {
            return Err(Error::Service {
                request: request_name,
                status: StatusCode::BadNotConnected,
                diagnostics: None,
            });
        };
        let sent = chrono::Utc::now();
        let result = channel.send(request, timeout).await;
        self.counters
            .transactions_performed
            .fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(response) => {
                if let Some(header) = response.response_header() {
                    self.clock.record(sent, chrono::Utc::now(), header.timestamp);
                }
                Ok(response)
            }
            Err(status) => {
                if status == StatusCode::BadTimeout {
                    self.counters
                        .timed_out_requests
                        .fetch_add(1, Ordering::Relaxed);
                    self.emit(ConnectionEvent::TimedOutRequest {
                        request: request_name,
                    });
                }
                Err(Error::Service {
                    request: request_name,
                    status,
                    diagnostics: None,
                })
            }
        }
    }

    /// Creates and activates a session on the connection.
    ///
    /// See OPC UA Part 4 - Services 5.6.2 and 5.6.3 for complete description of the services.
    ///
    /// # Arguments
    ///
    /// * `identity_token` - The identity the session is activated with.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Session>)` - The activated session.
    /// * `Err(Error)` - The connection is not connected or the server refused the session.
    ///
    pub async fn create_session(&self, identity_token: IdentityToken) -> Result<Arc<Session>, Error> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::InvalidState(format!(
                "cannot create a session while {}",
                self.state()
            )));
        }
        let session = Session::new(self.this.clone(), &self.config, identity_token);
        session.create_session().await?;
        if let Err(err) = session.activate_session().await {
            if let Err(close_err) = session.close(true).await {
                connection_warn!(
                    self,
                    "session {} did not close after failed activation, {}",
                    session.session_id(),
                    close_err
                );
            }
            return Err(err);
        }
        if self.config.keep_session_alive {
            session.start_keep_alive();
        }
        trace_lock!(self.sessions).push(session.clone());
        Ok(session)
    }

    /// Creates a session with the default user token of the configuration.
    pub async fn create_default_session(&self) -> Result<Arc<Session>, Error> {
        self.create_session(self.config.default_identity_token()).await
    }

    /// Closes a session and forgets it.
    pub async fn close_session(
        &self,
        session: &Arc<Session>,
        delete_subscriptions: bool,
    ) -> Result<(), Error> {
        trace_lock!(self.sessions).retain(|s| !Arc::ptr_eq(s, session));
        session.close(delete_subscriptions).await
    }

    /// Disconnects from the server. A reconnection in progress is canceled first and has
    /// completed its teardown when this returns. Sessions are closed unless the configuration
    /// keeps them pending on the server.
    pub async fn disconnect(&self) -> Result<(), Error> {
        let reconnection = trace_lock!(self.reconnection).take();
        if let Some(reconnection) = reconnection {
            connection_info!(self, "canceling the reconnection in progress");
            reconnection.cancel.cancel();
            if let Err(err) = reconnection.handle.await {
                connection_warn!(self, "reconnection task ended abnormally, {}", err);
            }
        }

        let state = self.state();
        if state == ConnectionState::Disconnected && trace_read_lock!(self.channel).is_none() {
            connection_debug!(self, "already disconnected");
            return Ok(());
        }
        if state == ConnectionState::Disconnecting {
            return Err(Error::InvalidState("already disconnecting".to_string()));
        }
        self.set_state(ConnectionState::Disconnecting);

        let sessions = std::mem::take(&mut *trace_lock!(self.sessions));
        for session in sessions {
            if self.config.keep_pending_sessions_on_disconnect {
                session.detach();
            } else if let Err(err) = session.close(true).await {
                connection_warn!(self, "session {} did not close cleanly, {}", session.session_id(), err);
            }
        }

        registry::unregister(self.id);
        self.stop_clock_timer();
        self.clock.reset();
        self.teardown_channel().await;
        self.set_state(ConnectionState::Disconnected);
        connection_info!(self, "disconnected from {}", self.config.endpoint_url);
        self.emit(ConnectionEvent::Close(None));
        Ok(())
    }

    /// The connection is registered in the process wide registry while it is connected.
    pub fn is_registered(&self) -> bool {
        registry::is_registered(self.id)
    }

    /// Sends a request outside of any session and checks the response kind.
    pub(crate) async fn send_request_on_channel<T>(
        &self,
        request: SupportedMessage,
        extract: impl FnOnce(SupportedMessage) -> Result<T, SupportedMessage>,
    ) -> Result<T, Error> {
        let request_name = request.type_name();
        let response = self
            .send_on_channel(request, self.config.request_timeout())
            .await?;
        extract(response).map_err(|response| process_unexpected_response(request_name, response))
    }
}

/// Forwards the events of a channel to the connection until the channel closes.
async fn watch_channel(
    connection: Weak<ClientConnection>,
    channel: Arc<dyn SecureChannel>,
    mut events: broadcast::Receiver<ChannelEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Channel watcher missed {} events", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(connection) = connection.upgrade() else {
            break;
        };
        let connection_event = match event {
            ChannelEvent::Abort => ConnectionEvent::Abort,
            ChannelEvent::Close(error) => {
                connection.emit(ConnectionEvent::Close(error));
                connection.on_channel_closed(&channel, error);
                break;
            }
            ChannelEvent::Lifetime75 { token_id } => ConnectionEvent::Lifetime75 { token_id },
            ChannelEvent::SecurityTokenRenewed { token_id } => {
                ConnectionEvent::SecurityTokenRenewed { token_id }
            }
            ChannelEvent::SendChunk(size) => {
                connection
                    .counters
                    .bytes_written
                    .fetch_add(size as u64, Ordering::Relaxed);
                ConnectionEvent::SendChunk(size)
            }
            ChannelEvent::ReceiveChunk(size) => {
                connection
                    .counters
                    .bytes_read
                    .fetch_add(size as u64, Ordering::Relaxed);
                ConnectionEvent::ReceiveChunk(size)
            }
            ChannelEvent::SendRequest {
                request,
                request_handle,
            } => ConnectionEvent::SendRequest {
                request,
                request_handle,
            },
            ChannelEvent::ReceiveResponse {
                response,
                request_handle,
            } => ConnectionEvent::ReceiveResponse {
                response,
                request_handle,
            },
        };
        connection.emit(connection_event);
    }
}
