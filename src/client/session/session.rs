// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc, OnceLock, Weak,
    },
    time::Duration,
};

use arc_swap::ArcSwap;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    client::{
        config::ClientConfig,
        connection::ClientConnection,
        publish_engine::PublishEngine,
        session::{session_debug, session_warn},
        subscription::Subscription,
        IdentityToken,
    },
    core::handle::AtomicHandle,
    sync::{Mutex, RwLock},
    types::{DateTime, NodeId, ServerState, StatusCode},
};

lazy_static! {
    static ref NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);
}

/// Notifications emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The periodic read of the server state succeeded.
    KeepAlive {
        state: ServerState,
        current_time: DateTime,
    },
    KeepAliveFailure(StatusCode),
    SessionClosed(StatusCode),
    /// The session was recreated on the server after the server forgot it.
    SessionRestored,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::KeepAlive { .. } => "keepalive",
            SessionEvent::KeepAliveFailure(_) => "keepalive_failure",
            SessionEvent::SessionClosed(_) => "session_closed",
            SessionEvent::SessionRestored => "session_restored",
        }
    }
}

/// An OPC-UA session. This session provides methods for all supported services that require an open session.
///
/// The session does not own the channel it talks over. It reaches it through its connection,
/// which may replace the channel at any time, so every transaction checks that the connection
/// still exists and has an open channel.
///
/// Regular transactions are sent one at a time in the order they were submitted. Publish requests
/// are pipelined independently by the publish engine of the session.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Session {
    #[derivative(Debug = "ignore")]
    pub(super) connection: Weak<ClientConnection>,
    #[derivative(Debug = "ignore")]
    pub(super) this: Weak<Session>,
    pub(super) internal_session_id: u32,
    pub(super) session_name: String,
    pub(super) identity_token: IdentityToken,
    pub(super) session_id: ArcSwap<NodeId>,
    pub(super) auth_token: ArcSwap<NodeId>,
    pub(super) server_nonce: RwLock<Option<Vec<u8>>>,
    /// Revised session timeout in milliseconds.
    pub(super) timeout: AtomicU64,
    pub(super) last_request_sent: RwLock<Option<DateTime>>,
    pub(super) last_response_received: RwLock<Option<DateTime>>,
    pub(super) request_handle: AtomicHandle,
    pub(super) request_timeout: Duration,
    pub(super) requested_session_timeout: u32,
    pub(super) preferred_locales: Vec<String>,
    /// FIFO admission of regular transactions.
    #[derivative(Debug = "ignore")]
    pub(super) transactions: tokio::sync::Mutex<()>,
    pub(super) pending_transactions: AtomicUsize,
    #[derivative(Debug = "ignore")]
    pub(super) reconnecting: watch::Sender<bool>,
    /// Set while the session is being recreated after the server declared it invalid.
    pub(super) repairing: AtomicBool,
    pub(super) closed: AtomicBool,
    pub(super) max_inflight_publish: usize,
    publish_engine: OnceLock<Arc<PublishEngine>>,
    #[derivative(Debug = "ignore")]
    pub(super) events: broadcast::Sender<SessionEvent>,
    pub(super) event_channel_capacity: usize,
    ignore_keep_alive_warning: AtomicBool,
    /// Limit advertised by the server, 0 when unknown.
    pub(super) max_monitored_items_per_call: AtomicUsize,
    default_max_monitored_items_per_call: usize,
    pub(super) keep_alive_interval: Duration,
    #[derivative(Debug = "ignore")]
    pub(super) keep_alive: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(
        connection: Weak<ClientConnection>,
        config: &ClientConfig,
        identity_token: IdentityToken,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let (reconnecting, _) = watch::channel(false);
        Arc::new_cyclic(|this| Session {
            connection,
            this: this.clone(),
            internal_session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            session_name: config.session_name.clone(),
            identity_token,
            session_id: ArcSwap::new(Arc::new(NodeId::null())),
            auth_token: ArcSwap::new(Arc::new(NodeId::null())),
            server_nonce: RwLock::new(None),
            timeout: AtomicU64::new(config.session_timeout as u64),
            last_request_sent: RwLock::new(None),
            last_response_received: RwLock::new(None),
            request_handle: AtomicHandle::new(1),
            request_timeout: config.request_timeout(),
            requested_session_timeout: config.session_timeout,
            preferred_locales: config.preferred_locales.clone(),
            transactions: tokio::sync::Mutex::new(()),
            pending_transactions: AtomicUsize::new(0),
            reconnecting,
            repairing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            max_inflight_publish: config.max_inflight_publish,
            publish_engine: OnceLock::new(),
            events,
            event_channel_capacity: config.event_channel_capacity,
            ignore_keep_alive_warning: AtomicBool::new(false),
            max_monitored_items_per_call: AtomicUsize::new(0),
            default_max_monitored_items_per_call: config.max_monitored_items_per_call,
            keep_alive_interval: config.keep_alive_interval(),
            keep_alive: Mutex::new(None),
        })
    }

    /// The internal ID of the session, used to keep track of multiple sessions in the same program.
    pub fn session_id(&self) -> u32 {
        self.internal_session_id
    }

    /// The session id assigned by the server.
    pub fn server_session_id(&self) -> NodeId {
        self.session_id.load().as_ref().clone()
    }

    pub(crate) fn authentication_token(&self) -> NodeId {
        self.auth_token.load().as_ref().clone()
    }

    pub(crate) fn connection(&self) -> Option<Arc<ClientConnection>> {
        self.connection.upgrade()
    }

    /// Revised session timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.load(Ordering::Relaxed))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn last_request_sent(&self) -> Option<DateTime> {
        *trace_read_lock!(self.last_request_sent)
    }

    pub fn last_response_received(&self) -> Option<DateTime> {
        *trace_read_lock!(self.last_response_received)
    }

    /// Number of regular transactions submitted and not yet answered.
    pub fn pending_transactions(&self) -> usize {
        self.pending_transactions.load(Ordering::Relaxed)
    }

    /// Receives the events emitted by the session from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Estimates how long the server keeps the session alive without further requests. The
    /// estimate is advisory, it is based on the last request the client sent.
    pub fn evaluate_remaining_lifetime(&self) -> Duration {
        let Some(last) = self.last_request_sent() else {
            return self.timeout();
        };
        let timeout = chrono::Duration::milliseconds(self.timeout.load(Ordering::Relaxed) as i64);
        (last + timeout - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// True when the session has a connection and the connection has an open channel.
    pub fn is_channel_valid(&self) -> bool {
        self.connection().is_some_and(|c| c.is_channel_valid())
    }

    /// True while the connection is repairing the channel this session talks over.
    pub fn is_reconnecting(&self) -> bool {
        *self.reconnecting.borrow()
    }

    pub(crate) fn set_reconnecting(&self, reconnecting: bool) {
        let previous = self.reconnecting.send_replace(reconnecting);
        if previous != reconnecting {
            session_debug!(self, "reconnecting = {}", reconnecting);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The publish engine of the session, created on first use.
    pub fn publish_engine(&self) -> &Arc<PublishEngine> {
        self.publish_engine
            .get_or_init(|| PublishEngine::new(self.this.clone(), self.max_inflight_publish))
    }

    pub(crate) fn publish_engine_if_created(&self) -> Option<&Arc<PublishEngine>> {
        self.publish_engine.get()
    }

    /// The subscriptions of the session.
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.publish_engine
            .get()
            .map(|e| e.subscriptions())
            .unwrap_or_default()
    }

    /// The next subscription created on this session skips the check of its keep-alive settings
    /// against the session timeout.
    pub fn ignore_next_keep_alive_warning(&self) {
        self.ignore_keep_alive_warning
            .store(true, Ordering::Relaxed);
    }

    pub(crate) fn take_ignore_keep_alive_warning(&self) -> bool {
        self.ignore_keep_alive_warning
            .swap(false, Ordering::Relaxed)
    }

    /// The number of monitored items that may be created in one call, as advertised by the
    /// server or else as configured.
    pub fn max_monitored_items_per_call(&self) -> usize {
        match self.max_monitored_items_per_call.load(Ordering::Relaxed) {
            0 => self.default_max_monitored_items_per_call,
            limit => limit,
        }
    }

    pub(crate) fn event_channel_capacity(&self) -> usize {
        self.event_channel_capacity
    }

    /// Stops the client side activity of the session and leaves it open on the server.
    pub(crate) fn detach(&self) {
        session_debug!(self, "detaching, the session stays open on the server");
        self.stop_keep_alive();
        if let Some(engine) = self.publish_engine.get() {
            engine.suspend(true);
        }
        // No reconnection will complete for a detached session
        self.set_reconnecting(false);
    }

    /// Marks the session closed and releases the subscriptions locally.
    pub(super) fn mark_closed(&self, status: StatusCode) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_keep_alive();
        if let Some(engine) = self.publish_engine.get() {
            engine.shutdown();
        }
        // Release anything waiting for the end of a reconnection
        self.set_reconnecting(false);
        if status.is_bad() {
            session_warn!(self, "session closed with {}", status);
        }
        self.emit(SessionEvent::SessionClosed(status));
    }
}
