// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    client::{
        config::{ClientConfig, ClientUserToken, ANONYMOUS_USER_TOKEN_ID},
        connection::ClientConnection,
        retry::ConnectionStrategy,
        transport::ChannelFactory,
        Error,
    },
    core::config::{Config, ConfigError},
    crypto::{CertificateManager, SecurityPolicy},
    types::MessageSecurityMode,
};

#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a `ClientBuilder`
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a `ClientBuilder` using a configuration file as the initial state.
    pub fn from_config(path: impl Into<PathBuf>) -> Result<ClientBuilder, ConfigError> {
        Ok(ClientBuilder {
            config: ClientConfig::load(&path.into())?,
        })
    }

    /// Yields a [`ClientConnection`] from the values set by the builder. The transport that
    /// opens secure channels and the certificate manager that vouches for server certificates
    /// are supplied by the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<ClientConnection>)` - A disconnected connection.
    /// * `Err(Error)` - The builder is not in a valid state.
    ///
    pub fn client(
        self,
        channel_factory: Arc<dyn ChannelFactory>,
        certificate_manager: Arc<dyn CertificateManager>,
    ) -> Result<Arc<ClientConnection>, Error> {
        ClientConnection::new(self.config, channel_factory, certificate_manager)
    }

    /// Yields a [`ClientConfig`] from the values set by the builder.
    pub fn config(self) -> ClientConfig {
        self.config
    }

    /// Tests if the builder is in a valid state to be able to yield a `ClientConnection`.
    pub fn is_valid(&self) -> bool {
        self.config.is_valid()
    }

    /// Sets the application name.
    pub fn application_name(mut self, application_name: impl Into<String>) -> Self {
        self.config.application_name = application_name.into();
        self
    }

    /// Sets the application uri
    pub fn application_uri(mut self, application_uri: impl Into<String>) -> Self {
        self.config.application_uri = application_uri.into();
        self
    }

    /// Sets the product uri.
    pub fn product_uri(mut self, product_uri: impl Into<String>) -> Self {
        self.config.product_uri = product_uri.into();
        self
    }

    /// Sets the name given to sessions created by the client.
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.config.session_name = session_name.into();
        self
    }

    /// Sets the url of the server endpoint. It is also used to discover the server's endpoints
    /// when its certificate has to be fetched.
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.config.endpoint_url = endpoint_url.into();
        self
    }

    /// Sets the security policy and mode of the endpoint to connect to.
    pub fn security(
        mut self,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Self {
        self.config.security_policy = security_policy;
        self.config.security_mode = security_mode;
        self
    }

    /// Sets the backoff used when opening a channel during the first connect.
    pub fn connection_strategy(mut self, connection_strategy: ConnectionStrategy) -> Self {
        self.config.connection_strategy = connection_strategy;
        self
    }

    /// Sets whether the connection is repaired automatically after the channel is lost.
    pub fn reconnect_on_failure(mut self, reconnect_on_failure: bool) -> Self {
        self.config.reconnect_on_failure = reconnect_on_failure;
        self
    }

    /// Sets whether sessions are left open on the server when the client disconnects.
    pub fn keep_pending_sessions_on_disconnect(mut self, keep: bool) -> Self {
        self.config.keep_pending_sessions_on_disconnect = keep;
        self
    }

    /// Sets the default timeout of requests.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout.as_millis() as u32;
        self
    }

    /// Sets the session timeout requested from the server.
    pub fn session_timeout(mut self, session_timeout: Duration) -> Self {
        self.config.session_timeout = session_timeout.as_millis() as u32;
        self
    }

    /// Periodically reads the server state on every session at the supplied interval.
    pub fn keep_session_alive(mut self, keep_alive_interval: Duration) -> Self {
        self.config.keep_session_alive = true;
        self.config.keep_alive_interval = keep_alive_interval.as_millis() as u32;
        self
    }

    /// Sets the number of publish requests each session keeps in flight.
    pub fn max_inflight_publish(mut self, max_inflight_publish: usize) -> Self {
        self.config.max_inflight_publish = max_inflight_publish;
        self
    }

    /// Sets the pause after a reconnected channel fails to restore the sessions.
    pub fn reconnection_retry_delay(mut self, delay: Duration) -> Self {
        self.config.reconnection_retry_delay = delay.as_millis() as u32;
        self
    }

    /// Sets the interval at which the clock offset to the server is recalculated. A zero
    /// interval disables clock adjustment.
    pub fn clock_adjustment_interval(mut self, interval: Duration) -> Self {
        self.config.clock_adjustment_interval = interval.as_millis() as u32;
        self
    }

    /// Sets the number of monitored items created per call when the server advertises no limit.
    pub fn max_monitored_items_per_call(mut self, max: usize) -> Self {
        self.config.max_monitored_items_per_call = max;
        self
    }

    /// Sets the capacity of the event channels of the connection, its sessions and their
    /// subscriptions.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Sets whether the client should automatically trust servers. If this is not set then
    /// the client will reject the server upon first connect and the server's certificate
    /// must be trusted through the certificate manager.
    pub fn trust_server_certs(mut self, trust_server_certs: bool) -> Self {
        self.config.trust_server_certs = trust_server_certs;
        self
    }

    /// Sets the preferred locales of the client. These are passed to the server during session
    /// activation to ensure localized strings are in the preferred language.
    pub fn preferred_locales(mut self, preferred_locales: Vec<String>) -> Self {
        self.config.preferred_locales = preferred_locales;
        self
    }

    /// Sets the id of the user token used by new sessions.
    pub fn default_user_token(mut self, user_token_id: impl Into<String>) -> Self {
        self.config.default_user_token = user_token_id.into();
        self
    }

    /// Adds a user token to the list supported by the client. The reserved anonymous id is
    /// ignored with an error.
    pub fn user_token(
        mut self,
        user_token_id: impl Into<String>,
        user_token: ClientUserToken,
    ) -> Self {
        let user_token_id = user_token_id.into();
        if user_token_id == ANONYMOUS_USER_TOKEN_ID {
            error!("User token id {} is reserved", user_token_id);
        } else {
            self.config.user_tokens.insert(user_token_id, user_token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn builder_produces_valid_config() {
        let builder = ClientBuilder::new()
            .application_name("Builder")
            .application_uri("urn:Builder")
            .endpoint_url("opc.tcp://localhost:4840")
            .request_timeout(Duration::from_secs(5))
            .max_inflight_publish(3)
            .user_token("ANONYMOUS", ClientUserToken::user_pass("x", "y"))
            .user_token("operator", ClientUserToken::user_pass("op", "secret"));
        assert!(builder.is_valid());
        let config = builder.config();
        assert_eq!(config.request_timeout, 5000);
        assert_eq!(config.max_inflight_publish, 3);
        assert_eq!(config.user_tokens.len(), 1);
        assert!(config.reconnect_on_failure);
        assert!(!config.keep_pending_sessions_on_disconnect);
    }

    #[test]
    fn builder_rejects_mismatched_security() {
        let builder = ClientBuilder::new()
            .application_name("Builder")
            .application_uri("urn:Builder")
            .endpoint_url("opc.tcp://localhost:4840")
            .security(SecurityPolicy::None, MessageSecurityMode::Sign);
        assert!(!builder.is_valid());
    }
}
