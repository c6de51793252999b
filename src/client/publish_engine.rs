// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Keeps a bounded number of publish requests outstanding for a session and routes the
//! notification messages of their responses to the subscriptions.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use crate::{
    client::{
        session::{session_debug, session_error, session_warn, Session},
        subscription::Subscription,
        Error,
    },
    sync::{Mutex, RwLock},
    types::{PublishResponse, StatusCode, SubscriptionAcknowledgement},
};

/// Interval at which the engine checks whether a channel became usable again.
const CHANNEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct PublishState {
    /// Publish requests sent and not yet answered.
    in_flight: usize,
    /// Number of requests the server accepts in flight.
    cap: usize,
    /// Acknowledgements waiting for the next publish request.
    acknowledgements: Vec<SubscriptionAcknowledgement>,
    suspended: bool,
    polling: bool,
    shut_down: bool,
}

/// What to do with the pipeline after a publish request failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PublishFailure {
    /// Resume once the connection is repaired.
    NotConnected,
    /// The server has no subscriptions for the session.
    NoSubscription,
    /// The server no longer knows the session.
    SessionInvalid,
    /// The server holds fewer requests than were sent.
    TooManyRequests,
    Other,
}

impl PublishFailure {
    fn classify(status: StatusCode) -> Self {
        match status {
            StatusCode::BadNotConnected
            | StatusCode::BadConnectionClosed
            | StatusCode::BadSecureChannelClosed
            | StatusCode::BadCommunicationError
            | StatusCode::BadServerNotConnected
            | StatusCode::BadNoCommunication
            | StatusCode::BadDisconnect
            | StatusCode::BadRequestInterrupted => PublishFailure::NotConnected,
            StatusCode::BadNoSubscription => PublishFailure::NoSubscription,
            StatusCode::BadSessionClosed | StatusCode::BadSessionIdInvalid => {
                PublishFailure::SessionInvalid
            }
            StatusCode::BadTooManyPublishRequests => PublishFailure::TooManyRequests,
            _ => PublishFailure::Other,
        }
    }
}

/// The publish engine of a session. It is created by the session on first use and shared by
/// the subscriptions of the session.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PublishEngine {
    #[derivative(Debug = "ignore")]
    session: Weak<Session>,
    #[derivative(Debug = "ignore")]
    this: Weak<PublishEngine>,
    state: Mutex<PublishState>,
    #[derivative(Debug = "ignore")]
    subscriptions: RwLock<HashMap<u32, Arc<Subscription>>>,
}

impl PublishEngine {
    pub(crate) fn new(session: Weak<Session>, max_inflight_publish: usize) -> Arc<Self> {
        Arc::new_cyclic(|this| PublishEngine {
            session,
            this: this.clone(),
            state: Mutex::new(PublishState {
                in_flight: 0,
                cap: max_inflight_publish.max(1),
                acknowledgements: Vec::new(),
                suspended: false,
                polling: false,
                shut_down: false,
            }),
            subscriptions: RwLock::new(HashMap::new()),
        })
    }

    /// Number of publish requests waiting for a response.
    pub fn in_flight(&self) -> usize {
        trace_lock!(self.state).in_flight
    }

    /// Number of publish requests the engine keeps in flight.
    pub fn max_in_flight(&self) -> usize {
        trace_lock!(self.state).cap
    }

    pub fn is_suspended(&self) -> bool {
        let state = trace_lock!(self.state);
        state.suspended || state.shut_down
    }

    /// Acknowledgements queued for the next publish request.
    pub fn pending_acknowledgements(&self) -> Vec<SubscriptionAcknowledgement> {
        trace_lock!(self.state).acknowledgements.clone()
    }

    pub fn subscription_count(&self) -> usize {
        trace_read_lock!(self.subscriptions).len()
    }

    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        trace_read_lock!(self.subscriptions)
            .values()
            .cloned()
            .collect()
    }

    pub fn subscription(&self, subscription_id: u32) -> Option<Arc<Subscription>> {
        trace_read_lock!(self.subscriptions)
            .get(&subscription_id)
            .cloned()
    }

    /// Starts feeding an active subscription.
    pub(crate) fn register_subscription(&self, subscription_id: u32, subscription: Arc<Subscription>) {
        debug!("Publish engine registers subscription {}", subscription_id);
        trace_write_lock!(self.subscriptions).insert(subscription_id, subscription);
        self.replenish();
    }

    /// Stops feeding a subscription. Acknowledgements not yet sent for it are dropped.
    pub(crate) fn unregister_subscription(&self, subscription_id: u32) -> Option<Arc<Subscription>> {
        let removed = trace_write_lock!(self.subscriptions).remove(&subscription_id);
        if removed.is_some() {
            debug!("Publish engine unregisters subscription {}", subscription_id);
            trace_lock!(self.state)
                .acknowledgements
                .retain(|a| a.subscription_id != subscription_id);
        }
        removed
    }

    /// Queues the acknowledgement of a notification message for the next publish request.
    pub fn acknowledge_notification(&self, subscription_id: u32, sequence_number: u32) {
        trace_lock!(self.state)
            .acknowledgements
            .push(SubscriptionAcknowledgement {
                subscription_id,
                sequence_number,
            });
    }

    /// Suspends or resumes sending publish requests. Resuming refills the pipeline.
    pub fn suspend(&self, suspended: bool) {
        trace_lock!(self.state).suspended = suspended;
        if !suspended {
            self.replenish();
        }
    }

    /// Stops the engine for good and terminates the subscriptions locally.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = trace_lock!(self.state);
            state.shut_down = true;
            state.acknowledgements.clear();
        }
        let subscriptions: Vec<_> = trace_write_lock!(self.subscriptions)
            .drain()
            .map(|(_, s)| s)
            .collect();
        for subscription in subscriptions {
            subscription.terminate_locally(StatusCode::BadSessionClosed);
        }
    }

    /// The time a publish request may be held by the server, the longest time any of the
    /// subscriptions may stay silent.
    pub fn timeout_hint(&self) -> Duration {
        trace_read_lock!(self.subscriptions)
            .values()
            .map(|s| s.timeout_hint())
            .max()
            .unwrap_or_default()
    }

    /// Sends publish requests until the pipeline is full.
    pub fn replenish(&self) {
        let missing = {
            let state = trace_lock!(self.state);
            state.cap.saturating_sub(state.in_flight)
        };
        for _ in 0..missing {
            if !self.send_publish_request() {
                break;
            }
        }
    }

    /// Sends one publish request if the pipeline has room, returning whether a request was
    /// scheduled. While the channel is not usable the engine polls for it instead.
    pub fn send_publish_request(&self) -> bool {
        let Some(session) = self.session.upgrade() else {
            return false;
        };
        if self.subscription_count() == 0 {
            return false;
        }
        let channel_ready = session.is_channel_valid() && !session.is_reconnecting();
        {
            let mut state = trace_lock!(self.state);
            if state.suspended || state.shut_down || state.in_flight >= state.cap {
                return false;
            }
            if !channel_ready {
                if !state.polling {
                    state.polling = true;
                    self.spawn_channel_poll();
                }
                return false;
            }
            state.in_flight += 1;
        }
        let Some(engine) = self.this.upgrade() else {
            return false;
        };
        tokio::spawn(async move {
            // Deferred so acknowledgements queued by the current response go out with this request
            tokio::task::yield_now().await;
            let (acknowledgements, in_flight) = {
                let mut state = trace_lock!(engine.state);
                (std::mem::take(&mut state.acknowledgements), state.in_flight)
            };
            let timeout_hint = engine.request_timeout_hint(&session, in_flight);
            session_debug!(
                session,
                "sending publish request with {} acknowledgements, {} in flight",
                acknowledgements.len(),
                in_flight
            );
            let result = session.publish(&acknowledgements, timeout_hint).await;
            engine.on_publish_result(&session, result);
        });
        true
    }

    fn request_timeout_hint(&self, session: &Session, in_flight: usize) -> Duration {
        let hint = match self.timeout_hint() {
            Duration::ZERO => session.request_timeout(),
            hint => hint,
        };
        let millis = (hint.as_millis() as u64).saturating_mul(in_flight.max(1) as u64);
        Duration::from_millis(millis.min(i32::MAX as u64))
    }

    fn spawn_channel_poll(&self) {
        let engine = self.this.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CHANNEL_POLL_INTERVAL).await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                let Some(session) = engine.session.upgrade() else {
                    break;
                };
                let shut_down = trace_lock!(engine.state).shut_down;
                if shut_down || engine.subscription_count() == 0 {
                    trace_lock!(engine.state).polling = false;
                    break;
                }
                if session.is_channel_valid() && !session.is_reconnecting() {
                    trace_lock!(engine.state).polling = false;
                    engine.replenish();
                    break;
                }
            }
        });
    }

    fn on_publish_result(&self, session: &Session, result: Result<PublishResponse, Error>) {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.on_publish_failure(session, err.status());
                return;
            }
        };
        {
            let mut state = trace_lock!(self.state);
            state.in_flight = state.in_flight.saturating_sub(1);
        }

        if let Some(results) = &response.results {
            for status in results.iter().filter(|s| s.is_bad()) {
                session_debug!(session, "acknowledgement was rejected with {}", status);
            }
        }

        let subscription_id = response.subscription_id;
        match self.subscription(subscription_id) {
            Some(subscription) => {
                let message = response.notification_message;
                if !message.is_keep_alive() {
                    self.acknowledge_notification(subscription_id, message.sequence_number);
                }
                subscription
                    .on_notification_message(message, response.available_sequence_numbers.as_deref());
            }
            None => {
                session_warn!(
                    session,
                    "publish response for subscription {} that is not known, ignored",
                    subscription_id
                );
            }
        }
        self.replenish();
    }

    fn on_publish_failure(&self, session: &Session, status: StatusCode) {
        let failure = PublishFailure::classify(status);
        let resend = {
            let mut state = trace_lock!(self.state);
            state.in_flight = state.in_flight.saturating_sub(1);
            match failure {
                PublishFailure::TooManyRequests => {
                    // The server holds the requests still outstanding and no more
                    state.cap = state.in_flight.max(1);
                    false
                }
                PublishFailure::SessionInvalid => {
                    state.suspended = true;
                    false
                }
                // Polls for the repaired channel unless a reconnection already refilled the pipeline
                PublishFailure::NotConnected => true,
                PublishFailure::Other => true,
                PublishFailure::NoSubscription => false,
            }
        };
        match failure {
            PublishFailure::NotConnected => {
                session_debug!(
                    session,
                    "publish failed with {}, waiting for the connection",
                    status
                );
            }
            PublishFailure::NoSubscription => {
                let count = self.subscription_count();
                if count > 0 {
                    session_warn!(
                        session,
                        "server reports no subscription while {} are active",
                        count
                    );
                }
            }
            PublishFailure::SessionInvalid => {
                session_error!(
                    session,
                    "publish failed with {}, publishing is suspended until the session is restored",
                    status
                );
            }
            PublishFailure::TooManyRequests => {
                session_warn!(
                    session,
                    "server accepts {} publish requests in flight",
                    self.max_in_flight()
                );
            }
            PublishFailure::Other => {
                session_warn!(session, "publish failed with {}", status);
            }
        }
        if resend {
            if failure == PublishFailure::Other {
                self.replenish();
            } else {
                self.send_publish_request();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classification() {
        assert_eq!(
            PublishFailure::classify(StatusCode::BadConnectionClosed),
            PublishFailure::NotConnected
        );
        assert_eq!(
            PublishFailure::classify(StatusCode::BadSessionClosed),
            PublishFailure::SessionInvalid
        );
        assert_eq!(
            PublishFailure::classify(StatusCode::BadTooManyPublishRequests),
            PublishFailure::TooManyRequests
        );
        assert_eq!(
            PublishFailure::classify(StatusCode::BadNoSubscription),
            PublishFailure::NoSubscription
        );
        assert_eq!(
            PublishFailure::classify(StatusCode::BadTimeout),
            PublishFailure::Other
        );
    }
}
