// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA Client module contains the functionality necessary for a client to connect to an OPC UA server,
//! authenticate itself, send messages, receive responses and receive notifications from subscriptions.
//!
//! A client is configured through a [`ClientConfig`], made programatically with a [`ClientBuilder`]
//! or loaded from disk. The builder yields a [`ClientConnection`] that owns the secure channel to
//! the server, opened through a caller supplied [`ChannelFactory`].
//!
//! Once connected, the connection creates [`Session`]s. Functions on the [`Session`] correspond to
//! OPC UA services so it can be used to:
//!
//! * Discover endpoints
//! * Create / modify / delete subscriptions
//! * Create / modify / delete monitored items
//! * Read and write values, read history
//! * Browse the address space and call methods
//!
//! Housekeeping is automatic. A lost channel is reopened and the sessions on it are reactivated
//! or recreated, subscriptions are transferred or recreated, and each session keeps a pipeline of
//! publish requests in flight for its subscriptions.
//!
//! Notifications are delivered through broadcast channels on [`Subscription`] and
//! [`MonitoredItem`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use opcua_client::client::{
//!     ChannelFactory, ClientBuilder, IdentityToken, MonitoredItemEvent, SubscriptionParameters,
//! };
//! use opcua_client::crypto::InMemoryCertificateManager;
//! use opcua_client::types::{MonitoringMode, MonitoringParameters, NodeId, TimestampsToReturn};
//!
//! async fn run(factory: Arc<dyn ChannelFactory>) -> Result<(), opcua_client::client::Error> {
//!     let connection = ClientBuilder::new()
//!         .application_name("My First Client")
//!         .application_uri("urn:MyFirstClient")
//!         .endpoint_url("opc.tcp://localhost:4855/")
//!         .client(factory, Arc::new(InMemoryCertificateManager::new(false)))?;
//!     connection.connect().await?;
//!     let session = connection.create_session(IdentityToken::Anonymous).await?;
//!
//!     let subscription = session
//!         .create_subscription2(SubscriptionParameters::default())
//!         .await?;
//!     let item = subscription.monitor(
//!         NodeId::new(2, "v1").into(),
//!         MonitoringMode::Reporting,
//!         MonitoringParameters::default(),
//!         TimestampsToReturn::Both,
//!     )?;
//!     let mut events = item.subscribe_events();
//!     while let Ok(event) = events.recv().await {
//!         if let MonitoredItemEvent::Changed(value) = event {
//!             println!("Value = {:?}", value.value);
//!         }
//!     }
//!     connection.disconnect().await
//! }
//! ```

use std::path::PathBuf;

use crate::{
    core::supported_message::SupportedMessage,
    types::{ResponseHeader, StatusCode},
};

mod builder;
mod config;
pub mod connection;
mod error;
pub mod monitored_item;
mod publish_engine;
mod retry;
pub mod session;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod tests;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, ClientUserToken, ANONYMOUS_USER_TOKEN_ID};
pub use connection::{
    ClientConnection, ConnectionEvent, ConnectionState, ConnectionStatistics,
    ReconnectionHandler, SessionRepair,
};
pub use error::Error;
pub use monitored_item::{
    MonitoredItem, MonitoredItemEvent, MonitoredItemGroup, MonitoredItemGroupEvent,
};
pub use publish_engine::PublishEngine;
pub use retry::{ConnectionStrategy, ExponentialBackoff};
pub use session::{Session, SessionEvent};
pub use subscription::{
    Subscription, SubscriptionEvent, SubscriptionParameters, SubscriptionState,
};
pub use transport::{ChannelEvent, ChannelFactory, ChannelOptions, SecureChannel, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityToken {
    /// Anonymous identity token
    Anonymous,
    /// User name and a password
    UserName(String, String),
    /// X5090 cert - a path to the cert.der, and private.pem
    X509(PathBuf, PathBuf),
}

/// Process the service result, i.e. where the request "succeeded" but the response
/// contains a failure status code.
pub(crate) fn process_service_result(
    request: &'static str,
    response_header: &ResponseHeader,
) -> Result<(), Error> {
    if response_header.service_result.is_bad() {
        info!(
            "Received a bad service result {} from the request {}",
            response_header.service_result, request
        );
        Err(Error::Service {
            request,
            status: response_header.service_result,
            diagnostics: diagnostics(response_header),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn process_unexpected_response(
    request: &'static str,
    response: SupportedMessage,
) -> Error {
    match response {
        SupportedMessage::ServiceFault(service_fault) => {
            error!(
                "Received a service fault of {} for the request {}",
                service_fault.response_header.service_result, request
            );
            Error::Service {
                request,
                status: service_fault.response_header.service_result,
                diagnostics: diagnostics(&service_fault.response_header),
            }
        }
        response => {
            error!(
                "Received an unexpected response {} to the request {}",
                response.type_name(),
                request
            );
            Error::UnexpectedResponse {
                request,
                response: response.type_name(),
            }
        }
    }
}

fn diagnostics(response_header: &ResponseHeader) -> Option<crate::types::DiagnosticInfo> {
    if response_header.service_diagnostics.is_null() {
        None
    } else {
        Some(response_header.service_diagnostics.clone())
    }
}

/// The status a response reports for the whole request, whatever its kind.
pub(crate) fn response_status(response: &SupportedMessage) -> StatusCode {
    response
        .response_header()
        .map(|h| h.service_result)
        .unwrap_or(StatusCode::BadUnknownResponse)
}

pub mod prelude {
    pub use crate::client::{
        ClientBuilder, ClientConfig, ClientConnection, ClientUserToken, ConnectionEvent,
        ConnectionState, ConnectionStrategy, Error, IdentityToken, MonitoredItem,
        MonitoredItemEvent, MonitoredItemGroup, MonitoredItemGroupEvent, Session, SessionEvent,
        Subscription, SubscriptionEvent, SubscriptionParameters, SubscriptionState,
    };
}
