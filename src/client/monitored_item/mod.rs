// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Monitored items and groups of monitored items.
//!
//! A monitored item reports the value changes or events of one attribute of one node. Its status
//! is `BadDataUnavailable` until the server has created it. Notifications that arrive before
//! that are kept and delivered, in order, once the item is active.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, OnceLock, Weak,
    },
};

use tokio::sync::{broadcast, watch};

use crate::{
    client::{session::services::attributes::single_result, subscription::Subscription, Error},
    sync::{Mutex, RwLock},
    types::{
        AttributeId, DataValue, MonitoredItemCreateRequest, MonitoredItemCreateResult,
        MonitoredItemModifyRequest, MonitoredItemModifyResult, MonitoringMode,
        MonitoringParameters, ReadValueId, StatusCode, TimestampsToReturn, Variant,
    },
};

mod filter;
mod group;

pub(crate) use filter::validate_filter;
pub use group::{MonitoredItemGroup, MonitoredItemGroupEvent};

/// Notifications emitted by a monitored item.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitoredItemEvent {
    /// The server created the item.
    Initialized,
    Changed(DataValue),
    Event(Option<Vec<Variant>>),
    Err(String),
    Terminated,
}

impl MonitoredItemEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitoredItemEvent::Initialized => "initialized",
            MonitoredItemEvent::Changed(_) => "changed",
            MonitoredItemEvent::Event(_) => "event",
            MonitoredItemEvent::Err(_) => "err",
            MonitoredItemEvent::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone)]
enum Notification {
    Value(DataValue),
    Event(Option<Vec<Variant>>),
}

#[derive(Debug, Clone)]
struct ItemSettings {
    monitored_item_id: u32,
    monitoring_mode: MonitoringMode,
    parameters: MonitoringParameters,
    revised_sampling_interval: f64,
    revised_queue_size: u32,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct MonitoredItem {
    #[derivative(Debug = "ignore")]
    subscription: Weak<Subscription>,
    #[derivative(Debug = "ignore")]
    this: Weak<MonitoredItem>,
    /// Zero until the item is prepared for monitoring.
    client_handle: AtomicU32,
    item_to_monitor: ReadValueId,
    timestamps_to_return: TimestampsToReturn,
    settings: RwLock<ItemSettings>,
    #[derivative(Debug = "ignore")]
    status: watch::Sender<StatusCode>,
    /// Notifications received before the item became active.
    buffer: Mutex<VecDeque<Notification>>,
    last_value: RwLock<Option<DataValue>>,
    /// Client handles of the items this item triggers.
    triggered_items: RwLock<BTreeSet<u32>>,
    #[derivative(Debug = "ignore")]
    events: Mutex<broadcast::Sender<MonitoredItemEvent>>,
    #[derivative(Debug = "ignore")]
    group_events: OnceLock<broadcast::Sender<MonitoredItemGroupEvent>>,
    event_channel_capacity: usize,
    terminated: AtomicBool,
}

impl MonitoredItem {
    pub(crate) fn new(
        subscription: Weak<Subscription>,
        item_to_monitor: ReadValueId,
        monitoring_mode: MonitoringMode,
        parameters: MonitoringParameters,
        timestamps_to_return: TimestampsToReturn,
        event_channel_capacity: usize,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(StatusCode::BadDataUnavailable);
        let (events, _) = broadcast::channel(event_channel_capacity);
        Arc::new_cyclic(|this| MonitoredItem {
            subscription,
            this: this.clone(),
            client_handle: AtomicU32::new(0),
            item_to_monitor,
            timestamps_to_return,
            settings: RwLock::new(ItemSettings {
                monitored_item_id: 0,
                monitoring_mode,
                parameters,
                revised_sampling_interval: 0.0,
                revised_queue_size: 0,
            }),
            status,
            buffer: Mutex::new(VecDeque::new()),
            last_value: RwLock::new(None),
            triggered_items: RwLock::new(BTreeSet::new()),
            events: Mutex::new(events),
            group_events: OnceLock::new(),
            event_channel_capacity,
            terminated: AtomicBool::new(false),
        })
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle.load(Ordering::Acquire)
    }

    /// The id the server assigned to the item, 0 until it is created.
    pub fn monitored_item_id(&self) -> u32 {
        trace_read_lock!(self.settings).monitored_item_id
    }

    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    pub fn timestamps_to_return(&self) -> TimestampsToReturn {
        self.timestamps_to_return
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        trace_read_lock!(self.settings).monitoring_mode
    }

    pub fn parameters(&self) -> MonitoringParameters {
        trace_read_lock!(self.settings).parameters.clone()
    }

    pub fn sampling_interval(&self) -> f64 {
        trace_read_lock!(self.settings).revised_sampling_interval
    }

    pub fn queue_size(&self) -> u32 {
        trace_read_lock!(self.settings).revised_queue_size
    }

    /// The status of the item, `BadDataUnavailable` until the server has created it.
    pub fn status(&self) -> StatusCode {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusCode> {
        self.status.subscribe()
    }

    /// The most recent value received for the item.
    pub fn last_value(&self) -> Option<DataValue> {
        trace_read_lock!(self.last_value).clone()
    }

    /// Client handles of the items this item triggers.
    pub fn triggered_items(&self) -> BTreeSet<u32> {
        trace_read_lock!(self.triggered_items).clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Receives the events emitted by the item from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitoredItemEvent> {
        trace_lock!(self.events).subscribe()
    }

    pub(crate) fn attach_to_group(&self, events: broadcast::Sender<MonitoredItemGroupEvent>) {
        let _ = self.group_events.set(events);
    }

    fn emit(&self, event: MonitoredItemEvent) {
        if let Some(group_events) = self.group_events.get() {
            let client_handle = self.client_handle();
            let group_event = match &event {
                MonitoredItemEvent::Changed(value) => Some(MonitoredItemGroupEvent::Changed {
                    client_handle,
                    value: value.clone(),
                }),
                MonitoredItemEvent::Event(fields) => Some(MonitoredItemGroupEvent::Event {
                    client_handle,
                    fields: fields.clone(),
                }),
                MonitoredItemEvent::Err(message) => Some(MonitoredItemGroupEvent::Err {
                    client_handle,
                    message: message.clone(),
                }),
                _ => None,
            };
            if let Some(group_event) = group_event {
                let _ = group_events.send(group_event);
            }
        }
        let _ = trace_lock!(self.events).send(event);
    }

    fn subscription(&self) -> Result<Arc<Subscription>, Error> {
        self.subscription
            .upgrade()
            .ok_or_else(|| Error::InvalidState("subscription has been dropped".to_string()))
    }

    /// Assigns the client handle and checks the filter against the monitored attribute. A
    /// filter that does not fit is reported through an error event and the returned error.
    pub(crate) fn prepare_for_monitoring(&self, client_handle: u32) -> Result<(), Error> {
        let filter_check = {
            let settings = trace_read_lock!(self.settings);
            validate_filter(&self.item_to_monitor, settings.parameters.filter.as_ref())
        };
        if let Err(err) = filter_check {
            warn!("Monitored item cannot be created, {}", err);
            self.status
                .send_replace(StatusCode::BadMonitoredItemFilterInvalid);
            self.emit(MonitoredItemEvent::Err(err.to_string()));
            return Err(err);
        }
        self.client_handle.store(client_handle, Ordering::Release);
        trace_write_lock!(self.settings).parameters.client_handle = client_handle;
        Ok(())
    }

    /// The request that creates the item on the server.
    pub(crate) fn create_request(&self) -> MonitoredItemCreateRequest {
        let settings = trace_read_lock!(self.settings);
        MonitoredItemCreateRequest {
            item_to_monitor: self.item_to_monitor.clone(),
            monitoring_mode: settings.monitoring_mode,
            requested_parameters: settings.parameters.clone(),
        }
    }

    /// Applies the server's answer to the creation of the item. A good result activates the
    /// item and releases the notifications received so far on the next tick.
    pub(crate) fn apply_result(&self, result: &MonitoredItemCreateResult) {
        {
            let mut settings = trace_write_lock!(self.settings);
            settings.monitored_item_id = result.monitored_item_id;
            settings.revised_sampling_interval = result.revised_sampling_interval;
            settings.revised_queue_size = result.revised_queue_size;
        }
        self.status.send_replace(result.status_code);
        if result.status_code.is_good() {
            debug!(
                "Monitored item {} with client handle {} is active",
                result.monitored_item_id,
                self.client_handle()
            );
            self.emit(MonitoredItemEvent::Initialized);
            if let Some(item) = self.this.upgrade() {
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    item.flush();
                });
            }
        } else {
            trace_lock!(self.buffer).clear();
            self.emit(MonitoredItemEvent::Err(format!(
                "monitored item {} was not created, {}",
                self.item_to_monitor.node_id, result.status_code
            )));
        }
    }

    /// Makes the item wait for its creation on a new subscription.
    pub(crate) fn reset_for_recreate(&self) {
        trace_write_lock!(self.settings).monitored_item_id = 0;
        self.status.send_replace(StatusCode::BadDataUnavailable);
    }

    /// Delivers the notifications held back while the item was not active.
    fn flush(&self) {
        let mut buffer = trace_lock!(self.buffer);
        if !self.status().is_good() {
            return;
        }
        while let Some(notification) = buffer.pop_front() {
            self.deliver(notification);
        }
    }

    fn deliver(&self, notification: Notification) {
        match notification {
            Notification::Value(value) => self.emit(MonitoredItemEvent::Changed(value)),
            Notification::Event(fields) => self.emit(MonitoredItemEvent::Event(fields)),
        }
    }

    fn receive(&self, notification: Notification) {
        if self.is_terminated() {
            return;
        }
        let mut buffer = trace_lock!(self.buffer);
        let status = self.status();
        if status == StatusCode::BadDataUnavailable || !buffer.is_empty() {
            buffer.push_back(notification);
        } else if status.is_good() {
            self.deliver(notification);
        } else {
            debug!(
                "Notification for monitored item {} with status {} is dropped",
                self.client_handle(),
                status
            );
        }
    }

    pub(crate) fn receive_value(&self, value: DataValue) {
        *trace_write_lock!(self.last_value) = Some(value.clone());
        self.receive(Notification::Value(value));
    }

    pub(crate) fn receive_event(&self, fields: Option<Vec<Variant>>) {
        self.receive(Notification::Event(fields));
    }

    pub(crate) fn is_event_notifier(&self) -> bool {
        self.item_to_monitor.attribute() == Some(AttributeId::EventNotifier)
    }

    pub(crate) fn modify_request(
        &self,
        sampling_interval: f64,
        queue_size: u32,
    ) -> MonitoredItemModifyRequest {
        let settings = trace_read_lock!(self.settings);
        let mut requested_parameters = settings.parameters.clone();
        requested_parameters.sampling_interval = sampling_interval;
        requested_parameters.queue_size = queue_size;
        MonitoredItemModifyRequest {
            monitored_item_id: settings.monitored_item_id,
            requested_parameters,
        }
    }

    pub(crate) fn apply_modify_result(
        &self,
        request: &MonitoredItemModifyRequest,
        result: &MonitoredItemModifyResult,
    ) {
        if result.status_code.is_good() {
            let mut settings = trace_write_lock!(self.settings);
            settings.parameters = request.requested_parameters.clone();
            settings.revised_sampling_interval = result.revised_sampling_interval;
            settings.revised_queue_size = result.revised_queue_size;
        } else {
            self.emit(MonitoredItemEvent::Err(format!(
                "modify failed with {}",
                result.status_code
            )));
        }
    }

    pub(crate) fn apply_monitoring_mode(&self, monitoring_mode: MonitoringMode, status: StatusCode) {
        if status.is_good() {
            trace_write_lock!(self.settings).monitoring_mode = monitoring_mode;
        }
    }

    /// Changes the sampling interval and queue size of the item.
    ///
    /// # Returns
    ///
    /// * `Ok(MonitoredItemModifyResult)` - The server's result, with the revised values.
    /// * `Err(Error)` - The request failed.
    ///
    pub async fn modify(
        &self,
        sampling_interval: f64,
        queue_size: u32,
    ) -> Result<MonitoredItemModifyResult, Error> {
        let subscription = self.subscription()?;
        let subscription_id = subscription.id_or_err()?;
        let session = subscription.session()?;
        let request = self.modify_request(sampling_interval, queue_size);
        let results = session
            .modify_monitored_items(
                subscription_id,
                self.timestamps_to_return,
                std::slice::from_ref(&request),
            )
            .await?;
        let result = single_result(
            "ModifyMonitoredItemsRequest",
            results,
        )?;
        self.apply_modify_result(&request, &result);
        Ok(result)
    }

    /// Changes the monitoring mode of the item.
    pub async fn set_monitoring_mode(
        &self,
        monitoring_mode: MonitoringMode,
    ) -> Result<StatusCode, Error> {
        let subscription = self.subscription()?;
        let subscription_id = subscription.id_or_err()?;
        let session = subscription.session()?;
        let results = session
            .set_monitoring_mode(subscription_id, monitoring_mode, &[self.monitored_item_id()])
            .await?;
        let status = single_result(
            "SetMonitoringModeRequest",
            results,
        )?;
        self.apply_monitoring_mode(monitoring_mode, status);
        Ok(status)
    }

    /// Makes this item trigger the reporting of other items of the same subscription. The links
    /// are kept by client handle and survive the recreation of the subscription.
    ///
    /// # Returns
    ///
    /// * `Ok((Vec<StatusCode>, Vec<StatusCode>))` - The results of the links added and removed.
    /// * `Err(Error)` - The request failed.
    ///
    pub async fn set_triggering(
        &self,
        links_to_add: &[Arc<MonitoredItem>],
        links_to_remove: &[Arc<MonitoredItem>],
    ) -> Result<(Vec<StatusCode>, Vec<StatusCode>), Error> {
        let subscription = self.subscription()?;
        let subscription_id = subscription.id_or_err()?;
        let session = subscription.session()?;
        let add_ids: Vec<u32> = links_to_add.iter().map(|i| i.monitored_item_id()).collect();
        let remove_ids: Vec<u32> = links_to_remove
            .iter()
            .map(|i| i.monitored_item_id())
            .collect();
        let (add_results, remove_results) = session
            .set_triggering(
                subscription_id,
                self.monitored_item_id(),
                &add_ids,
                &remove_ids,
            )
            .await?;
        let add_results = add_results.unwrap_or_default();
        let remove_results = remove_results.unwrap_or_default();
        {
            let mut triggered_items = trace_write_lock!(self.triggered_items);
            for (item, status) in links_to_remove.iter().zip(remove_results.iter()) {
                if status.is_good() {
                    triggered_items.remove(&item.client_handle());
                }
            }
            for (item, status) in links_to_add.iter().zip(add_results.iter()) {
                if status.is_good() {
                    triggered_items.insert(item.client_handle());
                }
            }
        }
        Ok((add_results, remove_results))
    }

    /// Deletes the item on the server and terminates it. Terminating an item twice is an error.
    pub async fn terminate(&self) -> Result<(), Error> {
        if self.is_terminated() {
            return Err(Error::InvalidState(
                "monitored item is already terminated".to_string(),
            ));
        }
        let subscription = match self.subscription() {
            Ok(subscription) => subscription,
            Err(err) => {
                self.terminate_locally();
                return Err(err);
            }
        };
        let monitored_item_id = self.monitored_item_id();
        let mut result = Ok(());
        if let (Some(subscription_id), true) = (subscription.id(), monitored_item_id != 0) {
            let deleted = match subscription.session() {
                Ok(session) => {
                    session
                        .delete_monitored_items(subscription_id, &[monitored_item_id])
                        .await
                }
                Err(err) => Err(err),
            };
            if let Err(err) = deleted {
                warn!(
                    "Monitored item {} could not be deleted, {}",
                    monitored_item_id, err
                );
                result = Err(err);
            }
        }
        subscription.remove_item(self.client_handle());
        self.terminate_locally();
        result
    }

    /// Terminates the item without telling the server. Listeners are released.
    pub(crate) fn terminate_locally(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.status.send_replace(StatusCode::BadMonitoredItemIdInvalid);
        trace_lock!(self.buffer).clear();
        self.emit(MonitoredItemEvent::Terminated);
        // Drop every receiver by replacing the sender
        let (events, _) = broadcast::channel(self.event_channel_capacity);
        *trace_lock!(self.events) = events;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    fn item() -> Arc<MonitoredItem> {
        MonitoredItem::new(
            Weak::new(),
            ReadValueId::new(NodeId::new(2, "Counter"), AttributeId::Value),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
            16,
        )
    }

    fn create_result(status_code: StatusCode) -> MonitoredItemCreateResult {
        MonitoredItemCreateResult {
            status_code,
            monitored_item_id: 7,
            revised_sampling_interval: 100.0,
            revised_queue_size: 1,
            filter_result: None,
        }
    }

    #[tokio::test]
    async fn notifications_before_creation_are_delivered_in_order() {
        let item = item();
        item.prepare_for_monitoring(1).unwrap();
        let mut events = item.subscribe_events();
        item.receive_value(DataValue::from(1i32));
        item.receive_value(DataValue::from(2i32));
        assert!(events.try_recv().is_err());

        item.apply_result(&create_result(StatusCode::Good));
        // Arrives before the flush and must queue behind the buffered values
        item.receive_value(DataValue::from(3i32));
        assert_eq!(events.recv().await.unwrap(), MonitoredItemEvent::Initialized);
        for expected in 1..=3i32 {
            match events.recv().await.unwrap() {
                MonitoredItemEvent::Changed(v) => {
                    assert_eq!(v.value, Some(Variant::from(expected)))
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(item.monitored_item_id(), 7);
        assert_eq!(item.last_value().unwrap().value, Some(Variant::from(3i32)));
    }

    #[tokio::test]
    async fn failed_creation_drops_buffer() {
        let item = item();
        item.prepare_for_monitoring(1).unwrap();
        let mut events = item.subscribe_events();
        item.receive_value(DataValue::from(1i32));
        item.apply_result(&create_result(StatusCode::BadNodeIdUnknown));
        assert!(matches!(
            events.recv().await.unwrap(),
            MonitoredItemEvent::Err(_)
        ));
        item.receive_value(DataValue::from(2i32));
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
        assert_eq!(item.status(), StatusCode::BadNodeIdUnknown);
    }

    #[tokio::test]
    async fn terminate_locally_releases_listeners() {
        let item = item();
        let mut events = item.subscribe_events();
        item.terminate_locally();
        assert_eq!(events.recv().await.unwrap(), MonitoredItemEvent::Terminated);
        assert!(matches!(
            events.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(item.status().is_bad());
        assert!(item.is_terminated());
    }

    #[tokio::test]
    async fn terminate_without_subscription_still_terminates() {
        let item = item();
        item.prepare_for_monitoring(1).unwrap();
        item.apply_result(&create_result(StatusCode::Good));
        let mut events = item.subscribe_events();
        assert!(matches!(item.terminate().await, Err(Error::InvalidState(_))));
        assert!(item.is_terminated());
        assert_eq!(item.status(), StatusCode::BadMonitoredItemIdInvalid);
        assert_eq!(events.recv().await.unwrap(), MonitoredItemEvent::Terminated);
        assert!(matches!(item.terminate().await, Err(Error::InvalidState(_))));
    }

    #[test]
    fn invalid_filter_is_reported() {
        let item = MonitoredItem::new(
            Weak::new(),
            ReadValueId::new(NodeId::new(2, "Counter"), AttributeId::EventNotifier),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
            16,
        );
        let mut events = item.subscribe_events();
        assert!(item.prepare_for_monitoring(1).is_err());
        assert_eq!(item.client_handle(), 0);
        assert_eq!(item.status(), StatusCode::BadMonitoredItemFilterInvalid);
        assert!(matches!(events.try_recv(), Ok(MonitoredItemEvent::Err(_))));
    }
}
