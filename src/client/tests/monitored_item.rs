// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{sync::Arc, time::Duration};

use tokio::sync::broadcast;

use crate::{
    client::{
        Error, MonitoredItemEvent, MonitoredItemGroupEvent, Session, Subscription,
        SubscriptionParameters,
    },
    core::supported_message::SupportedMessage,
    types::{
        AttributeId, DataValue, EventFieldList, EventFilter, MonitoredItemNotification,
        MonitoringFilter, MonitoringMode, MonitoringParameters, NodeId, NotificationMessage,
        ObjectId, ReadValueId, StatusCode, TimestampsToReturn, Variant,
    },
};

use super::{
    connected_session, eventually, mock::MockChannelFactory, sample_builder, within,
};

fn node(name: &str) -> ReadValueId {
    ReadValueId::from(NodeId::new(2, name))
}

fn values(sequence_number: u32, changes: &[(u32, i32)]) -> NotificationMessage {
    NotificationMessage::data_change(
        sequence_number,
        chrono::Utc::now(),
        changes
            .iter()
            .map(|(client_handle, value)| MonitoredItemNotification {
                client_handle: *client_handle,
                value: DataValue::new_now(*value),
            })
            .collect(),
        vec![],
    )
}

/// Number of items in each create request the server received.
fn create_batches(factory: &MockChannelFactory) -> Vec<usize> {
    factory
        .server()
        .requests_named("CreateMonitoredItemsRequest")
        .into_iter()
        .filter_map(|r| match r {
            SupportedMessage::CreateMonitoredItemsRequest(r) => {
                Some(r.items_to_create.map_or(0, |items| items.len()))
            }
            _ => None,
        })
        .collect()
}

async fn active_subscription(session: &Arc<Session>) -> Arc<Subscription> {
    let subscription = Subscription::create(session, SubscriptionParameters::default()).unwrap();
    within(subscription.wait_until_ready()).await.unwrap();
    subscription
}

async fn next_group_event(
    events: &mut broadcast::Receiver<MonitoredItemGroupEvent>,
) -> MonitoredItemGroupEvent {
    within(events.recv()).await.unwrap()
}

#[tokio::test]
async fn notifications_before_creation_are_delivered_in_order() {
    let (_connection, session, factory) =
        connected_session(sample_builder().max_inflight_publish(1)).await;
    let server = factory.server().clone();
    let subscription = active_subscription(&session).await;
    let subscription_id = subscription.id().unwrap();
    eventually("a publish request is held", || server.held_publish_count() == 1).await;

    server.delay("CreateMonitoredItemsRequest", Duration::from_millis(100));
    let item = subscription
        .monitor(
            node("Counter"),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = item.subscribe_events();
    assert_eq!(item.status(), StatusCode::BadDataUnavailable);
    eventually("the server is creating the item", || {
        server.count("CreateMonitoredItemsRequest") == 1
    })
    .await;

    let client_handle = item.client_handle();
    server
        .respond_publish(subscription_id, values(1, &[(client_handle, 1), (client_handle, 2)]), None)
        .unwrap();
    eventually("the values are received", || item.last_value().is_some()).await;
    assert_eq!(item.status(), StatusCode::BadDataUnavailable);
    assert!(events.try_recv().is_err());

    assert_eq!(within(events.recv()).await.unwrap(), MonitoredItemEvent::Initialized);
    for expected in [1, 2] {
        match within(events.recv()).await.unwrap() {
            MonitoredItemEvent::Changed(value) => {
                assert_eq!(value.value, Some(Variant::from(expected)))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(item.status(), StatusCode::Good);
    assert_ne!(item.monitored_item_id(), 0);

    // Once active, values are delivered as they arrive
    eventually("a publish request is held", || server.held_publish_count() == 1).await;
    server
        .respond_publish(subscription_id, values(2, &[(client_handle, 3)]), None)
        .unwrap();
    match within(events.recv()).await.unwrap() {
        MonitoredItemEvent::Changed(value) => assert_eq!(value.value, Some(Variant::from(3))),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn group_is_created_in_batches() {
    let (_connection, session, factory) = connected_session(
        sample_builder()
            .max_inflight_publish(1)
            .max_monitored_items_per_call(2),
    )
    .await;
    let server = factory.server().clone();
    let subscription = active_subscription(&session).await;
    let group = subscription
        .monitor_items(
            ["A", "B", "C", "D", "E"]
                .iter()
                .map(|name| (node(name), MonitoringParameters::default()))
                .collect(),
            MonitoringMode::Reporting,
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = group.subscribe_events();

    assert_eq!(next_group_event(&mut events).await, MonitoredItemGroupEvent::Initialized);
    assert_eq!(create_batches(&factory), vec![2, 2, 1]);
    assert_eq!(
        group.items().iter().map(|i| i.client_handle()).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(group.items().iter().all(|i| i.status().is_good()));
    assert_eq!(subscription.monitored_items().len(), 5);
    assert_eq!(subscription.groups().len(), 1);

    // Notifications of the items are fanned out with their client handle
    eventually("a publish request is held", || server.held_publish_count() == 1).await;
    server
        .respond_publish(subscription.id().unwrap(), values(1, &[(2, 20), (4, 40)]), None)
        .unwrap();
    for (expected_handle, expected_value) in [(2, 20), (4, 40)] {
        match next_group_event(&mut events).await {
            MonitoredItemGroupEvent::Changed {
                client_handle,
                value,
            } => {
                assert_eq!(client_handle, expected_handle);
                assert_eq!(value.value, Some(Variant::from(expected_value)));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[tokio::test]
async fn server_limit_splits_creation() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    assert_eq!(
        within(session.read_operation_limits()).await.unwrap(),
        1000
    );

    factory.server().set_max_monitored_items_per_call(Some(3));
    assert_eq!(within(session.read_operation_limits()).await.unwrap(), 3);
    assert_eq!(session.max_monitored_items_per_call(), 3);

    let subscription = active_subscription(&session).await;
    let group = subscription
        .monitor_items(
            ["A", "B", "C", "D"]
                .iter()
                .map(|name| (node(name), MonitoringParameters::default()))
                .collect(),
            MonitoringMode::Reporting,
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = group.subscribe_events();
    assert_eq!(next_group_event(&mut events).await, MonitoredItemGroupEvent::Initialized);
    assert_eq!(create_batches(&factory), vec![3, 1]);
}

#[tokio::test]
async fn rejected_items_are_removed() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    factory
        .server()
        .reject_node(NodeId::new(2, "Missing"), StatusCode::BadNodeIdUnknown);
    let subscription = active_subscription(&session).await;

    let group = subscription
        .monitor_items(
            vec![
                (node("A"), MonitoringParameters::default()),
                (node("Missing"), MonitoringParameters::default()),
                (node("C"), MonitoringParameters::default()),
            ],
            MonitoringMode::Reporting,
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = group.subscribe_events();
    match next_group_event(&mut events).await {
        MonitoredItemGroupEvent::Err { client_handle, .. } => assert_eq!(client_handle, 2),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(next_group_event(&mut events).await, MonitoredItemGroupEvent::Initialized);

    let items = group.items();
    assert_eq!(items[1].status(), StatusCode::BadNodeIdUnknown);
    assert!(items[0].status().is_good() && items[2].status().is_good());
    assert!(subscription.monitored_item(2).is_none());
    assert_eq!(subscription.monitored_items().len(), 2);

    // A single item reports through its own events
    let item = subscription
        .monitor(
            node("Missing"),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut item_events = item.subscribe_events();
    assert!(matches!(
        within(item_events.recv()).await.unwrap(),
        MonitoredItemEvent::Err(_)
    ));
    assert!(subscription.monitored_item(item.client_handle()).is_none());
}

#[tokio::test]
async fn filter_must_suit_the_attribute() {
    let (_connection, session, _factory) = connected_session(sample_builder()).await;
    let subscription = active_subscription(&session).await;
    let server_events = ReadValueId::new(ObjectId::Server.into(), AttributeId::EventNotifier);

    let result = subscription.monitor(
        server_events,
        MonitoringMode::Reporting,
        MonitoringParameters::default(),
        TimestampsToReturn::Both,
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(subscription.monitored_items().is_empty());
}

#[tokio::test]
async fn events_are_delivered_to_event_notifier_items() {
    let (_connection, session, factory) =
        connected_session(sample_builder().max_inflight_publish(1)).await;
    let server = factory.server().clone();
    let subscription = active_subscription(&session).await;
    let item = subscription
        .monitor(
            ReadValueId::new(ObjectId::Server.into(), AttributeId::EventNotifier),
            MonitoringMode::Reporting,
            MonitoringParameters {
                filter: Some(MonitoringFilter::Event(EventFilter::default())),
                ..Default::default()
            },
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = item.subscribe_events();
    assert_eq!(within(events.recv()).await.unwrap(), MonitoredItemEvent::Initialized);
    eventually("a publish request is held", || server.held_publish_count() == 1).await;

    let fields = vec![Variant::from("Alarm"), Variant::from(500u16)];
    let message = NotificationMessage::data_change(
        1,
        chrono::Utc::now(),
        // A data change for an event notifier is ignored
        vec![MonitoredItemNotification {
            client_handle: item.client_handle(),
            value: DataValue::new_now(1),
        }],
        vec![EventFieldList {
            client_handle: item.client_handle(),
            event_fields: Some(fields.clone()),
        }],
    );
    server
        .respond_publish(subscription.id().unwrap(), message, None)
        .unwrap();
    assert_eq!(
        within(events.recv()).await.unwrap(),
        MonitoredItemEvent::Event(Some(fields))
    );
    assert!(item.last_value().is_none());
}

#[tokio::test]
async fn modify_and_monitoring_mode() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let server = factory.server().clone();
    let subscription = active_subscription(&session).await;
    let item = subscription
        .monitor(
            node("Counter"),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
        )
        .unwrap();
    eventually("the item is created", || item.status().is_good()).await;

    let result = within(item.modify(500.0, 10)).await.unwrap();
    assert_eq!(result.status_code, StatusCode::Good);
    assert_eq!(item.sampling_interval(), 500.0);
    assert_eq!(item.queue_size(), 10);
    assert_eq!(item.parameters().sampling_interval, 500.0);
    assert_eq!(item.parameters().client_handle, item.client_handle());

    let status = within(item.set_monitoring_mode(MonitoringMode::Disabled))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::Good);
    assert_eq!(item.monitoring_mode(), MonitoringMode::Disabled);
    match server.requests_named("SetMonitoringModeRequest").last() {
        Some(SupportedMessage::SetMonitoringModeRequest(request)) => {
            assert_eq!(request.monitored_item_ids, Some(vec![item.monitored_item_id()]));
        }
        other => panic!("unexpected request {:?}", other),
    }

    let mut events = item.subscribe_events();
    within(item.terminate()).await.unwrap();
    assert_eq!(server.count("DeleteMonitoredItemsRequest"), 1);
    assert!(item.is_terminated());
    assert_eq!(item.status(), StatusCode::BadMonitoredItemIdInvalid);
    assert_eq!(events.recv().await.unwrap(), MonitoredItemEvent::Terminated);
    assert!(matches!(
        events.recv().await,
        Err(broadcast::error::RecvError::Closed)
    ));
    assert!(matches!(
        within(item.terminate()).await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn group_operations() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let server = factory.server().clone();
    let subscription = active_subscription(&session).await;
    let group = subscription
        .monitor_items(
            vec![
                (node("A"), MonitoringParameters::default()),
                (node("B"), MonitoringParameters::default()),
            ],
            MonitoringMode::Reporting,
            TimestampsToReturn::Both,
        )
        .unwrap();
    let mut events = group.subscribe_events();
    assert_eq!(next_group_event(&mut events).await, MonitoredItemGroupEvent::Initialized);

    let results = within(group.modify(250.0, 2)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(group.items().iter().all(|i| i.sampling_interval() == 250.0));

    let statuses = within(group.set_monitoring_mode(MonitoringMode::Sampling))
        .await
        .unwrap();
    assert_eq!(statuses, vec![StatusCode::Good, StatusCode::Good]);
    assert!(group
        .items()
        .iter()
        .all(|i| i.monitoring_mode() == MonitoringMode::Sampling));

    within(group.terminate()).await.unwrap();
    assert_eq!(server.count("DeleteMonitoredItemsRequest"), 1);
    assert!(group.is_terminated());
    assert!(group.items().iter().all(|i| i.is_terminated()));
    assert!(subscription.monitored_items().is_empty());
    assert!(subscription.groups().is_empty());
    assert_eq!(next_group_event(&mut events).await, MonitoredItemGroupEvent::Terminated);
    assert!(matches!(
        within(group.terminate()).await,
        Err(Error::InvalidState(_))
    ));
}
