// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use tokio::sync::broadcast;

use crate::{
    client::{subscription::Subscription, Error, MonitoredItem},
    sync::Mutex,
    types::{
        DataValue, MonitoredItemModifyResult, MonitoringMode, StatusCode, TimestampsToReturn,
        Variant,
    },
};

/// Notifications emitted by a group of monitored items. Value and event notifications name the
/// item they come from by its client handle.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitoredItemGroupEvent {
    /// The server created the group's items. Items it refused report an error first.
    Initialized,
    Changed {
        client_handle: u32,
        value: DataValue,
    },
    Event {
        client_handle: u32,
        fields: Option<Vec<Variant>>,
    },
    Err {
        client_handle: u32,
        message: String,
    },
    Terminated,
}

/// Several monitored items of one subscription, created with a single call and managed together.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MonitoredItemGroup {
    #[derivative(Debug = "ignore")]
    subscription: Weak<Subscription>,
    items: Vec<Arc<MonitoredItem>>,
    timestamps_to_return: TimestampsToReturn,
    #[derivative(Debug = "ignore")]
    events: Mutex<broadcast::Sender<MonitoredItemGroupEvent>>,
    event_channel_capacity: usize,
    terminated: AtomicBool,
}

impl MonitoredItemGroup {
    pub(crate) fn new(
        subscription: Weak<Subscription>,
        items: Vec<Arc<MonitoredItem>>,
        timestamps_to_return: TimestampsToReturn,
        event_channel_capacity: usize,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(event_channel_capacity);
        for item in &items {
            item.attach_to_group(events.clone());
        }
        Arc::new(MonitoredItemGroup {
            subscription,
            items,
            timestamps_to_return,
            events: Mutex::new(events),
            event_channel_capacity,
            terminated: AtomicBool::new(false),
        })
    }

    pub fn items(&self) -> &[Arc<MonitoredItem>] {
        &self.items
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitoredItemGroupEvent> {
        trace_lock!(self.events).subscribe()
    }

    pub(crate) fn emit(&self, event: MonitoredItemGroupEvent) {
        let _ = trace_lock!(self.events).send(event);
    }

    fn subscription(&self) -> Result<Arc<Subscription>, Error> {
        self.subscription
            .upgrade()
            .ok_or_else(|| Error::InvalidState("subscription has been dropped".to_string()))
    }

    /// Items the server has created, the only ones that can be changed or deleted.
    fn created_items(&self) -> Vec<&Arc<MonitoredItem>> {
        self.items
            .iter()
            .filter(|i| !i.is_terminated() && i.monitored_item_id() != 0)
            .collect()
    }

    /// Changes the sampling interval and queue size of every item of the group with one call.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<MonitoredItemModifyResult>)` - One result per created item, in the order of
    ///   [`MonitoredItemGroup::items`].
    /// * `Err(Error)` - The request failed.
    ///
    pub async fn modify(
        &self,
        sampling_interval: f64,
        queue_size: u32,
    ) -> Result<Vec<MonitoredItemModifyResult>, Error> {
        let subscription = self.subscription()?;
        let subscription_id = subscription.id_or_err()?;
        let items = self.created_items();
        let requests: Vec<_> = items
            .iter()
            .map(|i| i.modify_request(sampling_interval, queue_size))
            .collect();
        let results = subscription
            .session()?
            .modify_monitored_items(subscription_id, self.timestamps_to_return, &requests)
            .await?;
        for ((item, request), result) in items.iter().zip(requests.iter()).zip(results.iter()) {
            item.apply_modify_result(request, result);
        }
        Ok(results)
    }

    /// Changes the monitoring mode of every item of the group with one call.
    pub async fn set_monitoring_mode(
        &self,
        monitoring_mode: MonitoringMode,
    ) -> Result<Vec<StatusCode>, Error> {
        let subscription = self.subscription()?;
        let subscription_id = subscription.id_or_err()?;
        let items = self.created_items();
        let ids: Vec<u32> = items.iter().map(|i| i.monitored_item_id()).collect();
        let results = subscription
            .session()?
            .set_monitoring_mode(subscription_id, monitoring_mode, &ids)
            .await?;
        for (item, status) in items.iter().zip(results.iter()) {
            item.apply_monitoring_mode(monitoring_mode, *status);
        }
        Ok(results)
    }

    /// Deletes every item of the group with one call and terminates the group. Terminating a
    /// group twice is an error.
    pub async fn terminate(&self) -> Result<(), Error> {
        if self.is_terminated() {
            return Err(Error::InvalidState(
                "monitored item group is already terminated".to_string(),
            ));
        }
        let subscription = match self.subscription() {
            Ok(subscription) => subscription,
            Err(err) => {
                self.terminate_locally();
                return Err(err);
            }
        };
        let ids: Vec<u32> = self
            .created_items()
            .iter()
            .map(|i| i.monitored_item_id())
            .collect();
        let mut result = Ok(());
        if let (Some(subscription_id), false) = (subscription.id(), ids.is_empty()) {
            let deleted = match subscription.session() {
                Ok(session) => session.delete_monitored_items(subscription_id, &ids).await,
                Err(err) => Err(err),
            };
            if let Err(err) = deleted {
                warn!("Monitored item group could not be deleted, {}", err);
                result = Err(err);
            }
        }
        for item in &self.items {
            subscription.remove_item(item.client_handle());
        }
        subscription.remove_group(self);
        self.terminate_locally();
        result
    }

    /// Terminates the group and its items without telling the server.
    pub(crate) fn terminate_locally(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        for item in &self.items {
            item.terminate_locally();
        }
        self.emit(MonitoredItemGroupEvent::Terminated);
        let (events, _) = broadcast::channel(self.event_channel_capacity);
        *trace_lock!(self.events) = events;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AttributeId, MonitoredItemCreateResult, MonitoringParameters, NodeId, ReadValueId,
    };

    fn item(name: &str) -> Arc<MonitoredItem> {
        MonitoredItem::new(
            Weak::new(),
            ReadValueId::new(NodeId::new(2, name), AttributeId::Value),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
            16,
        )
    }

    #[tokio::test]
    async fn group_forwards_item_notifications() {
        let items = vec![item("a"), item("b")];
        let group = MonitoredItemGroup::new(Weak::new(), items.clone(), TimestampsToReturn::Both, 16);
        let mut events = group.subscribe_events();
        for (n, item) in items.iter().enumerate() {
            item.prepare_for_monitoring(n as u32 + 1).unwrap();
            item.apply_result(&MonitoredItemCreateResult {
                status_code: StatusCode::Good,
                monitored_item_id: n as u32 + 10,
                revised_sampling_interval: 100.0,
                revised_queue_size: 1,
                filter_result: None,
            });
        }
        tokio::task::yield_now().await;
        items[1].receive_value(DataValue::from(5i32));
        match events.recv().await.unwrap() {
            MonitoredItemGroupEvent::Changed {
                client_handle,
                value,
            } => {
                assert_eq!(client_handle, 2);
                assert_eq!(value.value, Some(Variant::from(5i32)));
            }
            other => panic!("unexpected event {:?}", other),
        }

        group.terminate_locally();
        assert!(items.iter().all(|i| i.is_terminated()));
        assert_eq!(
            events.recv().await.unwrap(),
            MonitoredItemGroupEvent::Terminated
        );
    }

    #[tokio::test]
    async fn terminate_without_subscription_still_terminates() {
        let items = vec![item("a"), item("b")];
        let group = MonitoredItemGroup::new(Weak::new(), items.clone(), TimestampsToReturn::Both, 16);
        let mut events = group.subscribe_events();
        assert!(matches!(group.terminate().await, Err(Error::InvalidState(_))));
        assert!(group.is_terminated());
        assert!(items.iter().all(|i| i.is_terminated()));
        assert_eq!(
            events.recv().await.unwrap(),
            MonitoredItemGroupEvent::Terminated
        );
    }
}
