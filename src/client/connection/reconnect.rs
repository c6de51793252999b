// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Automatic repair of a lost channel. Once started, reconnection retries until it succeeds or
//! is canceled by `disconnect()`.

use std::sync::{atomic::Ordering, Arc, Weak};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::{
    connection::{
        connection_debug, connection_info, connection_warn, ClientConnection, ConnectionEvent,
        ConnectionState, ReconnectionTask,
    },
    Error,
};

/// Invoked once a lost channel has been replaced by a new one, before the connection is declared
/// connected again. An error tears the new channel down and the reconnection starts over after the
/// configured retry delay.
#[async_trait]
pub trait ReconnectionHandler: Send + Sync {
    async fn on_reconnection_reestablished(
        &self,
        connection: &Arc<ClientConnection>,
    ) -> Result<(), Error>;
}

/// The default handler. Every session of the connection is reactivated on the new channel, or
/// recreated along with its subscriptions when the server no longer knows it.
#[derive(Debug, Default)]
pub struct SessionRepair;

#[async_trait]
impl ReconnectionHandler for SessionRepair {
    async fn on_reconnection_reestablished(
        &self,
        connection: &Arc<ClientConnection>,
    ) -> Result<(), Error> {
        for session in connection.sessions() {
            session.repair().await?;
        }
        Ok(())
    }
}

impl ClientConnection {
    /// Starts repairing the connection after the channel was lost while connected.
    pub(super) fn start_reconnection(&self) {
        if !self.transition(ConnectionState::Connected, ConnectionState::Reconnecting) {
            return;
        }
        connection_info!(self, "starting reconnection");
        self.emit(ConnectionEvent::ConnectionLost);
        self.emit(ConnectionEvent::StartReconnection);

        for session in self.sessions() {
            session.set_reconnecting(true);
        }
        if let Some(channel) = self.take_channel() {
            channel.dispose();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(repair_connection(self.this.clone(), cancel.clone()));
        if let Some(previous) = trace_lock!(self.reconnection).replace(ReconnectionTask { cancel, handle }) {
            previous.cancel.cancel();
        }
    }

    /// One attempt at replacing the channel and restoring the sessions on it.
    async fn reconnect_once(self: &Arc<Self>, cancel: &CancellationToken) -> Result<(), Error> {
        if self.config.requires_security()
            && (self.refetch_server_certificate.load(Ordering::Relaxed)
                || self.server_certificate().is_none())
        {
            connection_info!(self, "server certificate may have changed, fetching it again");
            self.clear_server_certificate();
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::ReconnectionCanceled),
                result = self.fetch_server_certificate() => result?,
            }
        }

        let options = self.channel_options();
        let created = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::ReconnectionCanceled),
            created = self.channel_factory.create(&options) => created,
        };
        let channel = match created {
            Ok(channel) => channel,
            Err(err) => {
                if err.requires_certificate_refetch() {
                    self.refetch_server_certificate
                        .store(true, Ordering::Relaxed);
                }
                return Err(err.into());
            }
        };
        if cancel.is_cancelled() {
            channel.dispose();
            return Err(Error::ReconnectionCanceled);
        }

        self.install_channel(channel);
        self.transition(
            ConnectionState::Reconnecting,
            ConnectionState::ReconnectingNewChannelConnected,
        );
        connection_debug!(self, "new channel is open, restoring the sessions");

        let handler = trace_read_lock!(self.reconnection_handler).clone();
        let restored = tokio::select! {
            _ = cancel.cancelled() => Err(Error::ReconnectionCanceled),
            restored = handler.on_reconnection_reestablished(self) => restored,
        };
        if cancel.is_cancelled() {
            self.teardown_channel().await;
            return Err(Error::ReconnectionCanceled);
        }

        match restored {
            Ok(()) => {
                if !self.transition(
                    ConnectionState::ReconnectingNewChannelConnected,
                    ConnectionState::Connected,
                ) {
                    return Err(Error::InvalidState(format!(
                        "connection became {} while reconnecting",
                        self.state()
                    )));
                }
                for session in self.sessions() {
                    session.set_reconnecting(false);
                    session.publish_engine().replenish();
                }
                connection_info!(self, "connection reestablished");
                self.emit(ConnectionEvent::AfterReconnection);
                self.emit(ConnectionEvent::ConnectionReestablished);
                Ok(())
            }
            Err(err) => {
                connection_warn!(self, "sessions could not be restored, {}", err);
                self.teardown_channel().await;
                self.set_state(ConnectionState::Reconnecting);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::ReconnectionCanceled),
                    _ = tokio::time::sleep(self.config.reconnection_retry_delay()) => {}
                }
                Err(err)
            }
        }
    }
}

/// The reconnection loop. The configured delays are used with an infinite retry count.
async fn repair_connection(connection: Weak<ClientConnection>, cancel: CancellationToken) {
    let Some(strategy) = connection
        .upgrade()
        .map(|c| c.config.connection_strategy.infinite())
    else {
        return;
    };
    let mut backoff = strategy.new_backoff();
    loop {
        let Some(this) = connection.upgrade() else {
            return;
        };
        match this.reconnect_once(&cancel).await {
            Ok(()) => return,
            Err(Error::ReconnectionCanceled) => {
                connection_info!(this, "reconnection was canceled");
                return;
            }
            Err(err) => {
                connection_warn!(this, "reconnection attempt has failed, {}", err);
                this.emit(ConnectionEvent::ReconnectionAttemptHasFailed(err.to_string()));
            }
        }
        let delay = backoff
            .next()
            .unwrap_or_else(|| std::time::Duration::from_millis(strategy.max_delay));
        this.emit(ConnectionEvent::Backoff {
            retry_count: backoff.retry_count(),
            delay,
        });
        drop(this);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Reconnection was canceled during backoff");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
