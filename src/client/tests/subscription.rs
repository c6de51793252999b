// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::time::Duration;

use tokio::sync::broadcast;

use crate::{
    client::{
        Error, MonitoredItemGroupEvent, Subscription, SubscriptionEvent, SubscriptionParameters,
        SubscriptionState,
    },
    core::supported_message::SupportedMessage,
    types::{
        DataValue, MonitoredItemNotification, MonitoringMode, MonitoringParameters, NodeId,
        NotificationMessage, ReadValueId, StatusCode, TimestampsToReturn,
    },
};

use super::{connected_session, eventually, sample_builder, within};

fn data_change(sequence_number: u32) -> NotificationMessage {
    NotificationMessage::data_change(
        sequence_number,
        chrono::Utc::now(),
        vec![MonitoredItemNotification {
            client_handle: 1,
            value: DataValue::new_now(sequence_number as i32),
        }],
        vec![],
    )
}

fn node(name: &str) -> ReadValueId {
    ReadValueId::from(NodeId::new(2, name))
}

/// Sequence numbers of the next `count` notification messages the subscription receives.
async fn received_sequence_numbers(
    events: &mut broadcast::Receiver<SubscriptionEvent>,
    count: usize,
) -> Vec<u32> {
    within(async {
        let mut sequence_numbers = Vec::new();
        while sequence_numbers.len() < count {
            if let SubscriptionEvent::ReceivedNotifications(message) = events.recv().await.unwrap()
            {
                sequence_numbers.push(message.sequence_number);
            }
        }
        sequence_numbers
    })
    .await
}

#[tokio::test]
async fn keep_alive_window_must_fit_the_session_timeout() {
    let (_connection, session, factory) =
        connected_session(sample_builder().session_timeout(Duration::from_secs(1))).await;
    let parameters = SubscriptionParameters {
        publishing_interval: Duration::from_millis(100),
        max_keep_alive_count: 10,
        ..Default::default()
    };

    assert!(matches!(
        Subscription::create(&session, parameters.clone()),
        Err(Error::Configuration(_))
    ));

    session.ignore_next_keep_alive_warning();
    let subscription = Subscription::create(&session, parameters.clone()).unwrap();
    within(subscription.wait_until_ready()).await.unwrap();

    // The warning is ignored once
    assert!(matches!(
        Subscription::create(&session, parameters.clone()),
        Err(Error::Configuration(_))
    ));
    let shorter = SubscriptionParameters {
        max_keep_alive_count: 5,
        ..parameters
    };
    Subscription::create(&session, shorter).unwrap();
    eventually("both subscriptions are created", || {
        factory.server().subscription_ids().len() == 2
    })
    .await;
}

#[tokio::test]
async fn lifecycle() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let server = factory.server().clone();

    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    let mut events = subscription.subscribe_events();
    assert_eq!(subscription.state(), SubscriptionState::Pending);
    assert!(subscription.id().is_none());

    let subscription_id = within(subscription.wait_until_ready()).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Active(subscription_id));
    assert!(matches!(
        events.recv().await.unwrap(),
        SubscriptionEvent::Started(id) if id == subscription_id
    ));
    assert!(session.publish_engine().subscription(subscription_id).is_some());
    assert_eq!(subscription.publishing_interval(), Duration::from_millis(100));
    assert_eq!(subscription.max_keep_alive_count(), 10);

    within(subscription.terminate()).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Terminated);
    assert!(matches!(
        events.recv().await.unwrap(),
        SubscriptionEvent::Terminated(StatusCode::Good)
    ));
    assert!(session.publish_engine().subscription(subscription_id).is_none());
    assert!(server.subscription_ids().is_empty());

    assert!(matches!(
        within(subscription.terminate()).await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(server.count("DeleteSubscriptionsRequest"), 1);
    assert!(matches!(
        subscription.monitor(
            node("Counter"),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
        ),
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn terminated_while_pending_is_deleted_on_the_server() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let server = factory.server().clone();
    server.delay("CreateSubscriptionRequest", Duration::from_millis(50));

    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    eventually("the server is creating the subscription", || {
        server.count("CreateSubscriptionRequest") == 1
    })
    .await;
    within(subscription.terminate()).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Terminated);
    assert!(matches!(
        within(subscription.wait_until_ready()).await,
        Err(Error::InvalidState(_))
    ));

    eventually("the late subscription is deleted", || {
        server.count("DeleteSubscriptionsRequest") == 1
    })
    .await;
    assert!(server.subscription_ids().is_empty());
    assert_eq!(session.publish_engine().subscription_count(), 0);
}

#[tokio::test]
async fn creation_failure_is_reported() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    factory
        .server()
        .fail_next("CreateSubscriptionRequest", StatusCode::BadTooManySubscriptions);

    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    let mut events = subscription.subscribe_events();
    let err = within(subscription.wait_until_ready()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTooManySubscriptions);
    assert_eq!(subscription.state(), SubscriptionState::Terminated);
    assert!(matches!(
        events.recv().await.unwrap(),
        SubscriptionEvent::Error(e) if e.status() == StatusCode::BadTooManySubscriptions
    ));
}

#[tokio::test]
async fn modify_and_set_publishing_mode() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    within(subscription.wait_until_ready()).await.unwrap();

    let parameters = SubscriptionParameters {
        publishing_interval: Duration::from_millis(250),
        lifetime_count: 30,
        max_keep_alive_count: 5,
        ..Default::default()
    };
    within(subscription.modify(parameters)).await.unwrap();
    assert_eq!(subscription.publishing_interval(), Duration::from_millis(250));
    assert_eq!(subscription.lifetime_count(), 30);
    assert_eq!(subscription.max_keep_alive_count(), 5);
    assert_eq!(
        subscription.timeout_hint(),
        Duration::from_millis(250 * 5 * 3)
    );

    let status = within(subscription.set_publishing_mode(false)).await.unwrap();
    assert_eq!(status, StatusCode::Good);
    assert!(!subscription.parameters().publishing_enabled);
    assert_eq!(factory.server().count("ModifySubscriptionRequest"), 1);
    assert_eq!(factory.server().count("SetPublishingModeRequest"), 1);
}

#[tokio::test]
async fn client_handles_only_increase() {
    let (_connection, session, _factory) = connected_session(sample_builder()).await;
    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    let monitor = |name: &str| {
        subscription
            .monitor(
                node(name),
                MonitoringMode::Reporting,
                MonitoringParameters::default(),
                TimestampsToReturn::Both,
            )
            .unwrap()
    };
    let items = vec![monitor("A"), monitor("B"), monitor("C")];
    assert_eq!(
        items.iter().map(|i| i.client_handle()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    eventually("the items are created", || {
        items.iter().all(|i| i.status().is_good())
    })
    .await;

    within(items[1].terminate()).await.unwrap();
    assert!(subscription.monitored_item(2).is_none());
    assert_eq!(monitor("D").client_handle(), 4);
}

#[tokio::test]
async fn server_timeout_terminates_the_subscription() {
    let (_connection, session, factory) =
        connected_session(sample_builder().max_inflight_publish(1)).await;
    let server = factory.server().clone();
    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    let subscription_id = within(subscription.wait_until_ready()).await.unwrap();
    let item = subscription
        .monitor(
            node("Counter"),
            MonitoringMode::Reporting,
            MonitoringParameters::default(),
            TimestampsToReturn::Both,
        )
        .unwrap();
    eventually("the item is created and a publish is held", || {
        item.status().is_good() && server.held_publish_count() == 1
    })
    .await;
    let mut events = subscription.subscribe_events();

    server
        .respond_publish(
            subscription_id,
            NotificationMessage::status_change(1, chrono::Utc::now(), StatusCode::BadTimeout),
            None,
        )
        .unwrap();

    assert!(matches!(
        within(events.recv()).await.unwrap(),
        SubscriptionEvent::StatusChanged(StatusCode::BadTimeout)
    ));
    assert!(matches!(
        within(events.recv()).await.unwrap(),
        SubscriptionEvent::Terminated(StatusCode::BadTimeout)
    ));
    assert!(subscription.has_timed_out());
    assert_eq!(subscription.state(), SubscriptionState::Terminated);
    assert!(item.is_terminated());
    assert!(session.publish_engine().subscription(subscription_id).is_none());
}

#[tokio::test]
async fn skipped_messages_are_republished() {
    let (_connection, session, factory) =
        connected_session(sample_builder().max_inflight_publish(2)).await;
    let server = factory.server().clone();
    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
    let subscription_id = within(subscription.wait_until_ready()).await.unwrap();
    let mut events = subscription.subscribe_events();
    eventually("two publish requests are held", || {
        server.held_publish_count() == 2
    })
    .await;

    server.store_for_republish(subscription_id, data_change(2));
    server
        .respond_publish(subscription_id, data_change(1), None)
        .unwrap();
    eventually("the first message is received", || {
        subscription.last_sequence_number() == 1
    })
    .await;
    server
        .respond_publish(subscription_id, data_change(3), Some(vec![2, 3]))
        .unwrap();

    assert_eq!(received_sequence_numbers(&mut events, 3).await, vec![1, 3, 2]);
    assert_eq!(server.count("RepublishRequest"), 1);
    assert_eq!(subscription.last_sequence_number(), 3);

    // Message 4 is no longer held by the server, nothing is asked again
    eventually("the pipeline is refilled", || {
        server.held_publish_count() == 2
    })
    .await;
    server
        .respond_publish(subscription_id, data_change(5), Some(vec![5]))
        .unwrap();
    assert_eq!(received_sequence_numbers(&mut events, 1).await, vec![5]);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(server.count("RepublishRequest"), 1);

    // The republished message is acknowledged along with the others
    eventually("every message is acknowledged", || {
        let acknowledged: Vec<u32> = server
            .acknowledgements()
            .iter()
            .map(|a| a.sequence_number)
            .collect();
        [1, 2, 3, 5].iter().all(|n| acknowledged.contains(n))
    })
    .await;
    let mut acknowledged: Vec<u32> = server
        .acknowledgements()
        .iter()
        .map(|a| a.sequence_number)
        .collect();
    acknowledged.sort_unstable();
    assert_eq!(acknowledged, vec![1, 2, 3, 5]);
}

#[tokio::test]
async fn recreated_subscription_keeps_its_items() {
    let (_connection, session, factory) = connected_session(sample_builder()).await;
    let server = factory.server().clone();
    let subscription = Subscription::create(&session, SubscriptionParameters::default()).unwrap();
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
    let mut group_events = group.subscribe_events();
    assert_eq!(
        within(group_events.recv()).await.unwrap(),
        MonitoredItemGroupEvent::Initialized
    );
    let old_subscription_id = subscription.id().unwrap();
    let items = group.items().to_vec();
    let old_ids: Vec<u32> = items.iter().map(|i| i.monitored_item_id()).collect();

    let (added, _) = within(items[0].set_triggering(&[items[1].clone()], &[]))
        .await
        .unwrap();
    assert_eq!(added, vec![StatusCode::Good]);
    assert_eq!(items[0].triggered_items().into_iter().collect::<Vec<_>>(), vec![2]);

    server.forget_sessions();
    server.set_transfer_status(StatusCode::BadUserAccessDenied);
    within(session.read_one(node("Counter"), TimestampsToReturn::Both, 0.0))
        .await
        .unwrap();

    let new_subscription_id = subscription.id().unwrap();
    assert_ne!(new_subscription_id, old_subscription_id);
    assert_eq!(
        items.iter().map(|i| i.client_handle()).collect::<Vec<_>>(),
        vec![1, 2]
    );
    let new_ids: Vec<u32> = items.iter().map(|i| i.monitored_item_id()).collect();
    assert!(new_ids.iter().all(|id| *id != 0 && !old_ids.contains(id)));
    assert!(items.iter().all(|i| i.status().is_good()));

    let set_triggering = server.requests_named("SetTriggeringRequest");
    assert_eq!(set_triggering.len(), 2);
    match set_triggering.last() {
        Some(SupportedMessage::SetTriggeringRequest(request)) => {
            assert_eq!(request.subscription_id, new_subscription_id);
            assert_eq!(request.triggering_item_id, new_ids[0]);
            assert_eq!(request.links_to_add, Some(vec![new_ids[1]]));
        }
        other => panic!("unexpected request {:?}", other),
    }
    assert!(session
        .publish_engine()
        .subscription(new_subscription_id)
        .is_some());
}
