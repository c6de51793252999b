// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Subscriptions and the routing of their notifications to monitored items.
//!
//! A subscription is created on the server in the background. [`Subscription::create`] returns
//! at once so listeners can be attached before the first event, and the subscription reports
//! `started` or `error` when the server has answered. Its state only moves forward, from
//! pending to active to terminating to terminated.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use tokio::sync::{broadcast, watch};

use crate::{
    client::{
        monitored_item::{MonitoredItem, MonitoredItemGroup, MonitoredItemGroupEvent},
        publish_engine::PublishEngine,
        session::{session_debug, session_warn, Session},
        Error,
    },
    core::handle::SequenceHandle,
    sync::{Mutex, RwLock},
    types::{
        CreateSubscriptionResponse, DataChangeNotification, EventNotificationList,
        MonitoredItemCreateResult, MonitoringMode, MonitoringParameters, NotificationData,
        NotificationMessage, ReadValueId, StatusChangeNotification, StatusCode,
        TimestampsToReturn,
    },
};

mod recreate;

/// Gaps wider than this are not recorded for republishing.
const MAX_TRACKED_GAP: u32 = 100;

/// The lifecycle of a subscription.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for the server to create the subscription.
    Pending,
    /// Created on the server with the given id.
    Active(u32),
    Terminating,
    Terminated,
}

/// Notifications emitted by a subscription.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// The server created the subscription with this id.
    Started(u32),
    KeepAlive { sequence_number: u32 },
    Terminated(StatusCode),
    StatusChanged(StatusCode),
    /// The subscription could not be created.
    Error(Error),
    ItemAdded(Arc<MonitoredItem>),
    ReceivedNotifications(NotificationMessage),
}

impl SubscriptionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionEvent::Started(_) => "started",
            SubscriptionEvent::KeepAlive { .. } => "keepalive",
            SubscriptionEvent::Terminated(_) => "terminated",
            SubscriptionEvent::StatusChanged(_) => "status_changed",
            SubscriptionEvent::Error(_) => "error",
            SubscriptionEvent::ItemAdded(_) => "item_added",
            SubscriptionEvent::ReceivedNotifications(_) => "received_notifications",
        }
    }
}

/// The requested settings of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionParameters {
    pub publishing_interval: Duration,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    /// 0 means no limit.
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

impl Default for SubscriptionParameters {
    fn default() -> Self {
        SubscriptionParameters {
            publishing_interval: Duration::from_millis(100),
            lifetime_count: 60,
            max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }
    }
}

/// The settings the server applied.
#[derive(Debug, Copy, Clone, PartialEq)]
struct RevisedParameters {
    publishing_interval: Duration,
    lifetime_count: u32,
    max_keep_alive_count: u32,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Subscription {
    #[derivative(Debug = "ignore")]
    session: Weak<Session>,
    #[derivative(Debug = "ignore")]
    this: Weak<Subscription>,
    #[derivative(Debug = "ignore")]
    publish_engine: Weak<PublishEngine>,
    parameters: RwLock<SubscriptionParameters>,
    revised: RwLock<RevisedParameters>,
    #[derivative(Debug = "ignore")]
    state: watch::Sender<SubscriptionState>,
    creation_error: Mutex<Option<Error>>,
    /// Monitored items by client handle.
    items: RwLock<BTreeMap<u32, Arc<MonitoredItem>>>,
    groups: RwLock<Vec<Arc<MonitoredItemGroup>>>,
    client_handles: SequenceHandle,
    last_sequence_number: AtomicU32,
    /// Sequence numbers skipped by the server that have not been recovered.
    missing: Mutex<BTreeSet<u32>>,
    republishing: AtomicBool,
    has_timed_out: AtomicBool,
    #[derivative(Debug = "ignore")]
    events: broadcast::Sender<SubscriptionEvent>,
    event_channel_capacity: usize,
}

impl Subscription {
    /// Creates a subscription on the session. The server side creation runs in the
    /// background, use [`Subscription::wait_until_ready`] or the `started` event to know when
    /// it completes.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Subscription>)` - The pending subscription.
    /// * `Err(Error)` - The session could time out before the subscription has a chance to send
    ///   a keep-alive. Call [`Session::ignore_next_keep_alive_warning`] to create it anyway.
    ///
    pub fn create(
        session: &Arc<Session>,
        parameters: SubscriptionParameters,
    ) -> Result<Arc<Subscription>, Error> {
        let keep_alive_window = parameters
            .publishing_interval
            .saturating_mul(parameters.max_keep_alive_count);
        if session.timeout() <= keep_alive_window && !session.take_ignore_keep_alive_warning() {
            session_warn!(
                session,
                "session timeout of {}ms is not greater than the keep-alive window of the subscription \
                 ({} keep-alives at {}ms), the session may expire before the server reports anything. \
                 Reduce the publishing interval or keep-alive count, or increase the session timeout.",
                session.timeout().as_millis(),
                parameters.max_keep_alive_count,
                parameters.publishing_interval.as_millis()
            );
            return Err(Error::Configuration(format!(
                "session timeout {}ms must be greater than max_keep_alive_count x publishing_interval = {}ms",
                session.timeout().as_millis(),
                keep_alive_window.as_millis()
            )));
        }

        let event_channel_capacity = session.event_channel_capacity();
        let (state, _) = watch::channel(SubscriptionState::Pending);
        let (events, _) = broadcast::channel(event_channel_capacity);
        let revised = RevisedParameters {
            publishing_interval: parameters.publishing_interval,
            lifetime_count: parameters.lifetime_count,
            max_keep_alive_count: parameters.max_keep_alive_count,
        };
        let subscription = Arc::new_cyclic(|this| Subscription {
            session: Arc::downgrade(session),
            this: this.clone(),
            publish_engine: Arc::downgrade(session.publish_engine()),
            parameters: RwLock::new(parameters),
            revised: RwLock::new(revised),
            state,
            creation_error: Mutex::new(None),
            items: RwLock::new(BTreeMap::new()),
            groups: RwLock::new(Vec::new()),
            client_handles: SequenceHandle::new(1),
            last_sequence_number: AtomicU32::new(0),
            missing: Mutex::new(BTreeSet::new()),
            republishing: AtomicBool::new(false),
            has_timed_out: AtomicBool::new(false),
            events,
            event_channel_capacity,
        });

        let pending = subscription.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            pending.create_on_server().await;
        });
        Ok(subscription)
    }

    async fn create_on_server(&self) {
        let session = match self.session() {
            Ok(session) => session,
            Err(err) => {
                self.fail_creation(err);
                return;
            }
        };
        let parameters = self.parameters();
        let response = match session.create_subscription(&parameters).await {
            Ok(response) => response,
            Err(err) => {
                session_warn!(session, "subscription could not be created, {}", err);
                self.fail_creation(err);
                return;
            }
        };
        self.apply_revised(&response);
        let subscription_id = response.subscription_id;
        let activated = self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Pending {
                *state = SubscriptionState::Active(subscription_id);
                true
            } else {
                false
            }
        });
        if !activated {
            session_debug!(
                session,
                "subscription {} was terminated while being created, deleting it",
                subscription_id
            );
            if let Err(err) = session.delete_subscriptions(&[subscription_id]).await {
                session_warn!(session, "subscription {} could not be deleted, {}", subscription_id, err);
            }
            return;
        }
        if let (Some(engine), Some(this)) = (self.publish_engine.upgrade(), self.this.upgrade()) {
            engine.register_subscription(subscription_id, this);
        }
        self.emit(SubscriptionEvent::Started(subscription_id));
    }

    fn fail_creation(&self, err: Error) {
        *trace_lock!(self.creation_error) = Some(err.clone());
        self.state.send_replace(SubscriptionState::Terminated);
        self.emit(SubscriptionEvent::Error(err));
    }

    pub(super) fn apply_revised(&self, response: &CreateSubscriptionResponse) {
        let mut revised = trace_write_lock!(self.revised);
        if let Ok(interval) =
            Duration::try_from_secs_f64(response.revised_publishing_interval / 1000.0)
        {
            revised.publishing_interval = interval;
        }
        revised.lifetime_count = response.revised_lifetime_count;
        revised.max_keep_alive_count = response.revised_max_keep_alive_count;
    }

    /// Waits until the server has created the subscription.
    ///
    /// # Returns
    ///
    /// * `Ok(u32)` - The subscription id.
    /// * `Err(Error)` - The creation failed or the subscription was terminated first.
    ///
    pub async fn wait_until_ready(&self) -> Result<u32, Error> {
        let mut state = self.state.subscribe();
        let current = *state
            .wait_for(|s| *s != SubscriptionState::Pending)
            .await
            .map_err(|_| Error::InvalidState("subscription has been dropped".to_string()))?;
        match current {
            SubscriptionState::Active(subscription_id) => Ok(subscription_id),
            _ => Err(trace_lock!(self.creation_error)
                .clone()
                .unwrap_or_else(|| {
                    Error::InvalidState("subscription has been terminated".to_string())
                })),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// The server assigned id, while the subscription is active.
    pub fn id(&self) -> Option<u32> {
        match self.state() {
            SubscriptionState::Active(subscription_id) => Some(subscription_id),
            _ => None,
        }
    }

    pub(crate) fn id_or_err(&self) -> Result<u32, Error> {
        self.id().ok_or_else(|| {
            Error::InvalidState(format!("subscription is {:?}", self.state()))
        })
    }

    pub(crate) fn session(&self) -> Result<Arc<Session>, Error> {
        self.session
            .upgrade()
            .ok_or_else(|| Error::InvalidState("session has been dropped".to_string()))
    }

    pub fn parameters(&self) -> SubscriptionParameters {
        trace_read_lock!(self.parameters).clone()
    }

    /// The publishing interval revised by the server.
    pub fn publishing_interval(&self) -> Duration {
        trace_read_lock!(self.revised).publishing_interval
    }

    pub fn lifetime_count(&self) -> u32 {
        trace_read_lock!(self.revised).lifetime_count
    }

    pub fn max_keep_alive_count(&self) -> u32 {
        trace_read_lock!(self.revised).max_keep_alive_count
    }

    /// How long the subscription may stay silent before the server gives up on it.
    pub fn timeout_hint(&self) -> Duration {
        let revised = trace_read_lock!(self.revised);
        revised
            .publishing_interval
            .saturating_mul(revised.max_keep_alive_count.saturating_mul(3))
    }

    pub fn last_sequence_number(&self) -> u32 {
        self.last_sequence_number.load(Ordering::Acquire)
    }

    /// True when the server reported that the subscription timed out.
    pub fn has_timed_out(&self) -> bool {
        self.has_timed_out.load(Ordering::Acquire)
    }

    pub fn monitored_items(&self) -> Vec<Arc<MonitoredItem>> {
        trace_read_lock!(self.items).values().cloned().collect()
    }

    pub fn monitored_item(&self, client_handle: u32) -> Option<Arc<MonitoredItem>> {
        trace_read_lock!(self.items).get(&client_handle).cloned()
    }

    pub fn groups(&self) -> Vec<Arc<MonitoredItemGroup>> {
        trace_read_lock!(self.groups).clone()
    }

    /// Receives the events emitted by the subscription from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SubscriptionEvent) {
        let _ = self.events.send(event);
    }

    fn ensure_usable(&self) -> Result<(), Error> {
        match self.state() {
            SubscriptionState::Pending | SubscriptionState::Active(_) => Ok(()),
            state => Err(Error::InvalidState(format!("subscription is {:?}", state))),
        }
    }

    fn next_client_handle(&self) -> Result<u32, Error> {
        self.client_handles
            .next()
            .ok_or_else(|| Error::InvalidState("client handles are exhausted".to_string()))
    }

    /// Monitors one attribute of a node. The item is returned at once and created on the server
    /// once the subscription is ready. Notifications received before then are held back.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<MonitoredItem>)` - The item, waiting for its creation.
    /// * `Err(Error)` - The subscription is terminated or the filter does not suit the attribute.
    ///
    pub fn monitor(
        &self,
        item_to_monitor: ReadValueId,
        monitoring_mode: MonitoringMode,
        parameters: MonitoringParameters,
        timestamps_to_return: TimestampsToReturn,
    ) -> Result<Arc<MonitoredItem>, Error> {
        self.ensure_usable()?;
        let item = MonitoredItem::new(
            self.this.clone(),
            item_to_monitor,
            monitoring_mode,
            parameters,
            timestamps_to_return,
            self.event_channel_capacity,
        );
        item.prepare_for_monitoring(self.next_client_handle()?)?;
        self.spawn_create(vec![item.clone()], timestamps_to_return, None);
        Ok(item)
    }

    /// Monitors several attributes as a group created with one call.
    pub fn monitor_items(
        &self,
        items_to_monitor: Vec<(ReadValueId, MonitoringParameters)>,
        monitoring_mode: MonitoringMode,
        timestamps_to_return: TimestampsToReturn,
    ) -> Result<Arc<MonitoredItemGroup>, Error> {
        self.ensure_usable()?;
        if items_to_monitor.is_empty() {
            return Err(StatusCode::BadNothingToDo.into());
        }
        let mut items = Vec::with_capacity(items_to_monitor.len());
        for (item_to_monitor, parameters) in items_to_monitor {
            let item = MonitoredItem::new(
                self.this.clone(),
                item_to_monitor,
                monitoring_mode,
                parameters,
                timestamps_to_return,
                self.event_channel_capacity,
            );
            item.prepare_for_monitoring(self.next_client_handle()?)?;
            items.push(item);
        }
        let group = MonitoredItemGroup::new(
            self.this.clone(),
            items.clone(),
            timestamps_to_return,
            self.event_channel_capacity,
        );
        trace_write_lock!(self.groups).push(group.clone());
        self.spawn_create(items, timestamps_to_return, Some(group.clone()));
        Ok(group)
    }

    fn spawn_create(
        &self,
        items: Vec<Arc<MonitoredItem>>,
        timestamps_to_return: TimestampsToReturn,
        group: Option<Arc<MonitoredItemGroup>>,
    ) {
        let Some(subscription) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let subscription_id = match subscription.wait_until_ready().await {
                Ok(subscription_id) => subscription_id,
                Err(err) => {
                    debug!("Monitored items are not created, {}", err);
                    subscription.fail_items(&items, err.status());
                    return;
                }
            };
            let result = subscription
                .create_items(subscription_id, &items, timestamps_to_return)
                .await;
            if let Some(group) = group {
                match result {
                    Ok(()) => group.emit(MonitoredItemGroupEvent::Initialized),
                    Err(err) => debug!("Monitored item group is incomplete, {}", err),
                }
            }
        });
    }

    fn fail_items(&self, items: &[Arc<MonitoredItem>], status_code: StatusCode) {
        let mut map = trace_write_lock!(self.items);
        for item in items {
            map.remove(&item.client_handle());
            item.apply_result(&MonitoredItemCreateResult {
                status_code,
                monitored_item_id: 0,
                revised_sampling_interval: 0.0,
                revised_queue_size: 0,
                filter_result: None,
            });
        }
    }

    /// Creates the items on the server, as many per call as the server accepts. Results are
    /// applied in request order. Items the server refuses are dropped from the subscription.
    pub(super) async fn create_items(
        &self,
        subscription_id: u32,
        items: &[Arc<MonitoredItem>],
        timestamps_to_return: TimestampsToReturn,
    ) -> Result<(), Error> {
        {
            let mut map = trace_write_lock!(self.items);
            for item in items {
                map.insert(item.client_handle(), item.clone());
            }
        }
        let session = match self.session() {
            Ok(session) => session,
            Err(err) => {
                self.fail_items(items, err.status());
                return Err(err);
            }
        };
        let limit = session.max_monitored_items_per_call().max(1);
        let mut first_error = None;
        for chunk in items.chunks(limit) {
            let requests: Vec<_> = chunk.iter().map(|i| i.create_request()).collect();
            match session
                .create_monitored_items(subscription_id, timestamps_to_return, &requests)
                .await
            {
                Ok(results) => {
                    if results.len() != chunk.len() {
                        session_warn!(
                            session,
                            "{} monitored items requested, {} results received",
                            chunk.len(),
                            results.len()
                        );
                    }
                    for (index, item) in chunk.iter().enumerate() {
                        match results.get(index) {
                            Some(result) if result.status_code.is_good() => {
                                item.apply_result(result);
                                self.emit(SubscriptionEvent::ItemAdded(item.clone()));
                            }
                            Some(result) => {
                                trace_write_lock!(self.items).remove(&item.client_handle());
                                item.apply_result(result);
                            }
                            None => self.fail_items(
                                std::slice::from_ref(item),
                                StatusCode::BadUnexpectedError,
                            ),
                        }
                    }
                }
                Err(err) => {
                    self.fail_items(chunk, err.status());
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn remove_item(&self, client_handle: u32) {
        trace_write_lock!(self.items).remove(&client_handle);
    }

    pub(crate) fn remove_group(&self, group: &MonitoredItemGroup) {
        trace_write_lock!(self.groups).retain(|g| !std::ptr::eq(g.as_ref(), group));
    }

    /// Changes the publishing interval, counts and priority of the subscription.
    pub async fn modify(&self, parameters: SubscriptionParameters) -> Result<(), Error> {
        let subscription_id = self.id_or_err()?;
        let response = self
            .session()?
            .modify_subscription(subscription_id, &parameters)
            .await?;
        {
            let mut revised = trace_write_lock!(self.revised);
            if let Ok(interval) =
                Duration::try_from_secs_f64(response.revised_publishing_interval / 1000.0)
            {
                revised.publishing_interval = interval;
            }
            revised.lifetime_count = response.revised_lifetime_count;
            revised.max_keep_alive_count = response.revised_max_keep_alive_count;
        }
        let publishing_enabled = trace_read_lock!(self.parameters).publishing_enabled;
        *trace_write_lock!(self.parameters) = SubscriptionParameters {
            publishing_enabled,
            ..parameters
        };
        Ok(())
    }

    /// Enables or disables publishing for the subscription.
    pub async fn set_publishing_mode(&self, publishing_enabled: bool) -> Result<StatusCode, Error> {
        let subscription_id = self.id_or_err()?;
        let results = self
            .session()?
            .set_publishing_mode(&[subscription_id], publishing_enabled)
            .await?;
        let status = results
            .first()
            .copied()
            .unwrap_or(StatusCode::BadUnexpectedError);
        if status.is_good() {
            trace_write_lock!(self.parameters).publishing_enabled = publishing_enabled;
        }
        Ok(status)
    }

    /// Handles a notification message received for the subscription.
    ///
    /// # Arguments
    ///
    /// * `message` - The notification message.
    /// * `available_sequence_numbers` - The messages the server still holds for the
    ///   subscription, used to recover messages that were skipped.
    ///
    pub(crate) fn on_notification_message(
        &self,
        message: NotificationMessage,
        available_sequence_numbers: Option<&[u32]>,
    ) {
        let sequence_number = message.sequence_number;
        if message.is_keep_alive() {
            // A keep-alive carries the next sequence number without consuming it
            self.emit(SubscriptionEvent::KeepAlive { sequence_number });
        } else {
            self.track_sequence_number(sequence_number);
            for notification in message.notification_data.iter().flatten() {
                match notification.clone().resolve() {
                    Ok(NotificationData::DataChange(data_change)) => {
                        self.on_data_change(data_change)
                    }
                    Ok(NotificationData::Event(events)) => self.on_events(events),
                    Ok(NotificationData::StatusChange(status_change)) => {
                        self.on_status_change(status_change)
                    }
                    Ok(NotificationData::ExtensionObject(_)) => {}
                    Err(status) => {
                        warn!(
                            "Notification {} of subscription {:?} cannot be decoded, {}",
                            notification.kind(),
                            self.id(),
                            status
                        );
                    }
                }
            }
            self.emit(SubscriptionEvent::ReceivedNotifications(message));
        }
        if let Some(available) = available_sequence_numbers {
            self.recover_missing(available);
        }
    }

    fn track_sequence_number(&self, sequence_number: u32) {
        let last = self.last_sequence_number.load(Ordering::Acquire);
        let mut missing = trace_lock!(self.missing);
        missing.remove(&sequence_number);
        if sequence_number > last {
            let gap = sequence_number - last - 1;
            if last != 0 && gap > 0 {
                if gap <= MAX_TRACKED_GAP {
                    missing.extend(last + 1..sequence_number);
                } else {
                    warn!(
                        "Subscription {:?} skipped {} notification messages",
                        self.id(),
                        gap
                    );
                }
            }
            self.last_sequence_number
                .store(sequence_number, Ordering::Release);
        }
    }

    fn recover_missing(&self, available: &[u32]) {
        let to_republish: Vec<u32> = {
            let mut missing = trace_lock!(self.missing);
            if missing.is_empty() {
                return;
            }
            missing.retain(|n| {
                let held = available.contains(n);
                if !held {
                    warn!(
                        "Notification message {} of subscription {:?} is lost",
                        n,
                        self.id()
                    );
                }
                held
            });
            missing.iter().copied().collect()
        };
        if to_republish.is_empty() || self.republishing.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(subscription) = self.this.upgrade() else {
            self.republishing.store(false, Ordering::Release);
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = subscription.republish_missing(&to_republish).await {
                warn!("Republish failed, {}", err);
            }
            subscription.republishing.store(false, Ordering::Release);
        });
    }

    /// Asks the server to send again notification messages that were skipped and dispatches
    /// them.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - The number of messages recovered.
    /// * `Err(Error)` - A republish request failed.
    ///
    pub async fn republish_missing(&self, sequence_numbers: &[u32]) -> Result<usize, Error> {
        let subscription_id = self.id_or_err()?;
        let session = self.session()?;
        let mut recovered = 0;
        for &sequence_number in sequence_numbers {
            match session.republish(subscription_id, sequence_number).await {
                Ok(message) => {
                    if let Some(engine) = self.publish_engine.upgrade() {
                        engine.acknowledge_notification(subscription_id, sequence_number);
                    }
                    self.on_notification_message(message, None);
                    recovered += 1;
                }
                Err(err) if err.status() == StatusCode::BadMessageNotAvailable => {
                    session_warn!(
                        session,
                        "message {} of subscription {} is no longer available",
                        sequence_number,
                        subscription_id
                    );
                    trace_lock!(self.missing).remove(&sequence_number);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(recovered)
    }

    fn on_data_change(&self, data_change: DataChangeNotification) {
        for notification in data_change.monitored_items.unwrap_or_default() {
            let item = self.monitored_item(notification.client_handle);
            match item {
                Some(item) if item.is_event_notifier() => {
                    warn!(
                        "Server sent a data change for the event notifier item {}, ignored",
                        notification.client_handle
                    );
                }
                Some(item) => item.receive_value(notification.value),
                None => {
                    // The item may still be on its way to the server
                    debug!(
                        "Data change for unknown client handle {}",
                        notification.client_handle
                    );
                }
            }
        }
    }

    fn on_events(&self, events: EventNotificationList) {
        for event in events.events.unwrap_or_default() {
            match self.monitored_item(event.client_handle) {
                Some(item) => item.receive_event(event.event_fields),
                None => error!(
                    "Event for unknown client handle {} on subscription {:?}",
                    event.client_handle,
                    self.id()
                ),
            }
        }
    }

    fn on_status_change(&self, status_change: StatusChangeNotification) {
        match status_change.status {
            StatusCode::GoodSubscriptionTransferred => {
                info!("Subscription {:?} was transferred", self.id());
            }
            StatusCode::BadTimeout => {
                warn!("Subscription {:?} timed out on the server", self.id());
                self.has_timed_out.store(true, Ordering::Release);
                self.emit(SubscriptionEvent::StatusChanged(StatusCode::BadTimeout));
                self.terminate_locally(StatusCode::BadTimeout);
            }
            status => {
                debug!("Subscription {:?} status changed to {}", self.id(), status);
                self.emit(SubscriptionEvent::StatusChanged(status));
            }
        }
    }

    /// Deletes the subscription on the server and terminates it with its monitored items.
    /// Terminating a subscription twice is an error.
    pub async fn terminate(&self) -> Result<(), Error> {
        let mut previous = SubscriptionState::Terminated;
        let started = self.state.send_if_modified(|state| match *state {
            SubscriptionState::Pending | SubscriptionState::Active(_) => {
                previous = *state;
                *state = SubscriptionState::Terminating;
                true
            }
            _ => false,
        });
        if !started {
            return Err(Error::InvalidState(
                "subscription is already terminated".to_string(),
            ));
        }

        if let SubscriptionState::Active(subscription_id) = previous {
            if let Some(engine) = self.publish_engine.upgrade() {
                engine.unregister_subscription(subscription_id);
            }
            match self.session() {
                Ok(session) => {
                    if let Err(err) = session.delete_subscriptions(&[subscription_id]).await {
                        session_warn!(
                            session,
                            "subscription {} could not be deleted on the server, {}",
                            subscription_id,
                            err
                        );
                    }
                }
                Err(_) => debug!("Subscription {} has no session left", subscription_id),
            }
        }
        self.terminate_items_locally();

        tokio::task::yield_now().await;
        let finished = self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Terminating {
                *state = SubscriptionState::Terminated;
                true
            } else {
                false
            }
        });
        if finished {
            self.emit(SubscriptionEvent::Terminated(StatusCode::Good));
        }
        Ok(())
    }

    /// Terminates the subscription and its items without telling the server.
    pub(crate) fn terminate_locally(&self, status: StatusCode) {
        let mut previous = SubscriptionState::Terminated;
        let changed = self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Terminated {
                false
            } else {
                previous = *state;
                *state = SubscriptionState::Terminated;
                true
            }
        });
        if !changed {
            return;
        }
        if let SubscriptionState::Active(subscription_id) = previous {
            if let Some(engine) = self.publish_engine.upgrade() {
                engine.unregister_subscription(subscription_id);
            }
        }
        self.terminate_items_locally();
        self.emit(SubscriptionEvent::Terminated(status));
    }

    fn terminate_items_locally(&self) {
        let items = std::mem::take(&mut *trace_write_lock!(self.items));
        let groups = std::mem::take(&mut *trace_write_lock!(self.groups));
        for group in groups {
            group.terminate_locally();
        }
        for item in items.into_values() {
            item.terminate_locally();
        }
    }
}
