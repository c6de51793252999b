// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The transaction pipeline of a session. Regular requests are admitted one at a time in the
//! order they were submitted, publish requests go straight to the channel.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt};

use crate::{
    client::{
        response_status,
        session::{session_debug, session_error, session_warn, Session, SessionEvent},
        Error,
    },
    core::supported_message::SupportedMessage,
    types::{RequestHeader, StatusCode},
};

/// Counts a transaction as pending for as long as it lives.
struct PendingTransaction<'a>(&'a AtomicUsize);

impl<'a> PendingTransaction<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        PendingTransaction(counter)
    }
}

impl Drop for PendingTransaction<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Holds the repair flag of a session, cleared on drop.
struct RepairGuard<'a>(&'a AtomicBool);

impl<'a> RepairGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(RepairGuard(flag))
        }
    }
}

impl Drop for RepairGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Session {
    /// Construct a request header for the session. The authentication token, timestamp and
    /// request handle are stamped again when the request is actually sent.
    pub(crate) fn make_request_header(&self) -> RequestHeader {
        self.make_request_header_with_hint(self.request_timeout)
    }

    pub(crate) fn make_request_header_with_hint(&self, timeout: Duration) -> RequestHeader {
        RequestHeader {
            authentication_token: self.authentication_token(),
            timestamp: self
                .connection()
                .map(|c| c.adjusted_now())
                .unwrap_or_else(chrono::Utc::now),
            request_handle: 0,
            timeout_hint: timeout.as_millis().min(u32::MAX as u128) as u32,
            ..Default::default()
        }
    }

    /// Sends a request on the channel of the connection without queueing it.
    pub(super) async fn send_raw(
        &self,
        mut request: SupportedMessage,
    ) -> Result<SupportedMessage, Error> {
        let request_name = request.type_name();
        if self.is_closed() && !matches!(request, SupportedMessage::CloseSessionRequest(_)) {
            return Err(Error::InvalidState(format!(
                "cannot send {} on a closed session",
                request_name
            )));
        }
        let Some(connection) = self.connection() else {
            return Err(Error::Service {
                request: request_name,
                status: StatusCode::BadNotConnected,
                diagnostics: None,
            });
        };

        let is_publish = request.is_publish_request();
        let mut timeout = self.request_timeout;
        if let Some(header) = request.request_header_mut() {
            header.authentication_token = self.authentication_token();
            header.timestamp = connection.adjusted_now();
            header.request_handle = self.request_handle.next();
            if is_publish && header.timeout_hint > 0 {
                timeout = Duration::from_millis(header.timeout_hint as u64);
            }
        }

        *trace_write_lock!(self.last_request_sent) = Some(chrono::Utc::now());
        let response = connection.send_on_channel(request, timeout).await?;
        *trace_write_lock!(self.last_response_received) = Some(chrono::Utc::now());
        Ok(response)
    }

    /// Sends a request through the transaction pipeline. Publish requests bypass the queue,
    /// anything else waits for its turn and for any reconnection to complete.
    ///
    /// A request the server rejects because it no longer knows the session triggers a single
    /// attempt to recreate the session and replay the request.
    pub(crate) async fn send(
        &self,
        request: impl Into<SupportedMessage>,
    ) -> Result<SupportedMessage, Error> {
        let request: SupportedMessage = request.into();
        if request.is_publish_request() {
            return self.send_raw(request).await;
        }

        let replay = if request.is_activate_session_request()
            || matches!(
                request,
                SupportedMessage::CreateSessionRequest(_) | SupportedMessage::CloseSessionRequest(_)
            ) {
            None
        } else {
            Some(request.clone())
        };

        let result = {
            let _pending = PendingTransaction::new(&self.pending_transactions);
            let _turn = self.transactions.lock().await;
            self.wait_while_reconnecting().await;
            self.send_raw(request).await
        };

        let status = match &result {
            Ok(response) => response_status(response),
            Err(err) => err.status(),
        };
        match replay {
            Some(request) if status == StatusCode::BadSessionIdInvalid => {
                self.recover_and_replay(request).await
            }
            _ => result,
        }
    }

    async fn wait_while_reconnecting(&self) {
        let mut reconnecting = self.reconnecting.subscribe();
        if *reconnecting.borrow() {
            session_debug!(self, "transaction waits for the reconnection to complete");
        }
        let _ = reconnecting.wait_for(|r| !*r).await;
    }

    /// Recreates the session on the server and replays the request that failed. Re-entry while
    /// a recovery is running is an error.
    fn recover_and_replay<'a>(
        &'a self,
        request: SupportedMessage,
    ) -> BoxFuture<'a, Result<SupportedMessage, Error>> {
        async move {
            let Some(_repairing) = RepairGuard::acquire(&self.repairing) else {
                session_error!(
                    self,
                    "{} failed with BadSessionIdInvalid during a session repair",
                    request.type_name()
                );
                return Err(Error::RepairInProgress);
            };
            session_warn!(
                self,
                "server no longer knows the session, recreating it to replay {}",
                request.type_name()
            );

            {
                let _turn = self.transactions.lock().await;
                self.create_session().await?;
                self.activate_session().await?;
            }
            self.restore_subscriptions().await;
            self.resume_publishing();
            self.emit(SessionEvent::SessionRestored);

            let _turn = self.transactions.lock().await;
            self.send_raw(request).await
        }
        .boxed()
    }

    /// Restores the session after the connection has a new channel. The session is reactivated
    /// when the server still knows it, otherwise it is recreated and its subscriptions are
    /// transferred or recreated.
    pub(crate) async fn repair(&self) -> Result<(), Error> {
        let recreated = match self.activate_session().await {
            Ok(()) => false,
            Err(err) => {
                session_warn!(
                    self,
                    "session could not be reactivated, {}, creating a new one",
                    err
                );
                self.create_session().await?;
                self.activate_session().await?;
                true
            }
        };
        self.set_reconnecting(false);
        if recreated {
            self.restore_subscriptions().await;
            self.emit(SessionEvent::SessionRestored);
        }
        self.resume_publishing();
        Ok(())
    }

    fn resume_publishing(&self) {
        if let Some(engine) = self.publish_engine_if_created() {
            engine.suspend(false);
        }
    }

    /// Moves the subscriptions of the session onto a recreated session. Subscriptions the server
    /// will not transfer are created again with their monitored items.
    pub(super) async fn restore_subscriptions(&self) {
        let subscriptions = self.subscriptions();
        let subscription_ids: Vec<u32> = subscriptions.iter().filter_map(|s| s.id()).collect();
        if subscription_ids.is_empty() {
            return;
        }

        let transferred: HashSet<u32> =
            match self.transfer_subscriptions(&subscription_ids, true).await {
                Ok(results) => subscription_ids
                    .iter()
                    .zip(results)
                    .filter(|(_, r)| r.status_code.is_good())
                    .map(|(id, _)| *id)
                    .collect(),
                Err(err) => {
                    session_warn!(self, "subscriptions could not be transferred, {}", err);
                    HashSet::new()
                }
            };

        for subscription in subscriptions {
            let Some(id) = subscription.id() else {
                continue;
            };
            if transferred.contains(&id) {
                session_debug!(self, "subscription {} was transferred", id);
            } else if let Err(err) = subscription
                .recreate_subscription_and_monitored_items()
                .await
            {
                session_error!(self, "subscription {} could not be recreated, {}", id, err);
            }
        }
    }
}
