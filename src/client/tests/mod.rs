// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    client::{
        ClientBuilder, ClientConnection, ConnectionStrategy, IdentityToken, Session,
    },
    crypto::InMemoryCertificateManager,
};

use self::mock::{MockChannelFactory, MockServer, ENDPOINT_URL};

mod mock;
mod monitored_item;
mod subscription;

/// A configuration with short delays and no background clock adjustment.
fn sample_builder() -> ClientBuilder {
    ClientBuilder::new()
        .application_name("Test Client")
        .application_uri("urn:TestClient")
        .endpoint_url(ENDPOINT_URL)
        .connection_strategy(ConnectionStrategy::new(
            Duration::from_millis(5),
            Duration::from_millis(20),
            3,
            0.0,
        ))
        .reconnection_retry_delay(Duration::from_millis(10))
        .clock_adjustment_interval(Duration::ZERO)
}

fn new_client(builder: ClientBuilder) -> (Arc<ClientConnection>, Arc<MockChannelFactory>) {
    let factory = MockChannelFactory::new(MockServer::new());
    let connection = builder
        .client(
            factory.clone(),
            Arc::new(InMemoryCertificateManager::new(true)),
        )
        .unwrap();
    (connection, factory)
}

/// A connected client with one anonymous session.
async fn connected_session(
    builder: ClientBuilder,
) -> (Arc<ClientConnection>, Arc<Session>, Arc<MockChannelFactory>) {
    let (connection, factory) = new_client(builder);
    within(connection.connect()).await.unwrap();
    let session = within(connection.create_session(IdentityToken::Anonymous))
        .await
        .unwrap();
    (connection, session, factory)
}

/// Polls `condition` until it holds, failing the test after a few seconds.
async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting until {}", what);
}

/// Awaits `future`, failing the test if it takes more than a few seconds.
async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}
