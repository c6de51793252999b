// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Client configuration data.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    client::{retry::ConnectionStrategy, IdentityToken},
    core::{comms::url::is_opc_ua_binary_url, config::Config},
    crypto::SecurityPolicy,
    types::{ApplicationType, MessageSecurityMode},
};

pub const ANONYMOUS_USER_TOKEN_ID: &str = "ANONYMOUS";

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ClientUserToken {
    /// Username
    pub user: String,
    /// Password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

impl ClientUserToken {
    /// Constructs a client token which holds a username and password.
    pub fn user_pass<S, T>(user: S, password: T) -> Self
    where
        S: Into<String>,
        T: Into<String>,
    {
        ClientUserToken {
            user: user.into(),
            password: Some(password.into()),
            cert_path: None,
            private_key_path: None,
        }
    }

    /// Constructs a client token which holds a username and paths to X509 certificate and private key.
    pub fn x509<S>(user: S, cert_path: &Path, private_key_path: &Path) -> Self
    where
        S: Into<String>,
    {
        ClientUserToken {
            user: user.into(),
            password: None,
            cert_path: Some(cert_path.to_string_lossy().to_string()),
            private_key_path: Some(private_key_path.to_string_lossy().to_string()),
        }
    }

    /// Test if the token, i.e. that it has a name, and either a password OR a cert path and key path.
    /// The paths are not validated.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.user.is_empty() {
            error!("User token has an empty name.");
            valid = false;
        }
        if self.password.is_some() {
            if self.cert_path.is_some() || self.private_key_path.is_some() {
                error!(
                    "User token {} holds a password and certificate info - it cannot be both.",
                    self.user
                );
                valid = false;
            }
        } else if self.cert_path.is_none() || self.private_key_path.is_none() {
            error!(
                "User token {} fails to provide a password or both a certificate path and a private key path.",
                self.user
            );
            valid = false;
        }
        valid
    }

    /// The identity this token presents when a session is activated.
    pub fn identity_token(&self) -> IdentityToken {
        match (&self.password, &self.cert_path, &self.private_key_path) {
            (Some(password), _, _) => IdentityToken::UserName(self.user.clone(), password.clone()),
            (None, Some(cert_path), Some(private_key_path)) => {
                IdentityToken::X509(PathBuf::from(cert_path), PathBuf::from(private_key_path))
            }
            _ => IdentityToken::Anonymous,
        }
    }
}

/// Client OPC UA configuration
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Name of the application that the client presents itself as to the server
    pub application_name: String,
    /// The application uri
    pub application_uri: String,
    /// Product uri
    pub product_uri: String,
    /// Session name
    pub session_name: String,
    /// Url of the server endpoint, also used for discovery
    pub endpoint_url: String,
    /// Security mode of the endpoint to connect to
    pub security_mode: MessageSecurityMode,
    /// Security policy of the endpoint to connect to
    pub security_policy: SecurityPolicy,
    /// Backoff used when opening the channel
    pub connection_strategy: ConnectionStrategy,
    /// Repair the connection automatically when the channel is lost
    pub reconnect_on_failure: bool,
    /// Leave sessions open on the server when disconnecting
    pub keep_pending_sessions_on_disconnect: bool,
    /// Default timeout of a request in milliseconds
    pub request_timeout: u32,
    /// Requested session timeout in milliseconds
    pub session_timeout: u32,
    /// Periodically read the server state to keep the session alive
    pub keep_session_alive: bool,
    /// Interval of the session keep-alive read in milliseconds
    pub keep_alive_interval: u32,
    /// Number of publish requests kept in flight per session
    pub max_inflight_publish: usize,
    /// Pause after a reconnected channel fails to restore the sessions, in milliseconds
    pub reconnection_retry_delay: u32,
    /// Interval at which the client / server clock offset is recalculated in milliseconds, 0 to
    /// disable
    pub clock_adjustment_interval: u32,
    /// Monitored items created per call when the server does not advertise a limit
    pub max_monitored_items_per_call: usize,
    /// Capacity of the event broadcast channels
    pub event_channel_capacity: usize,
    /// Auto trusts server certificates. For testing/samples only unless you're sure what you're
    /// doing.
    pub trust_server_certs: bool,
    /// Preferred locales
    pub preferred_locales: Vec<String>,
    /// Identifier of the user token used for new sessions, empty for anonymous
    pub default_user_token: String,
    /// User tokens
    pub user_tokens: BTreeMap<String, ClientUserToken>,
}

impl Config for ClientConfig {
    fn is_valid(&self) -> bool {
        let mut valid = true;

        if self.application_name.is_empty() {
            error!("Application name is empty");
            valid = false;
        }
        if self.application_uri.is_empty() {
            error!("Application uri is empty");
            valid = false;
        }
        if !is_opc_ua_binary_url(&self.endpoint_url) {
            error!("Endpoint url \"{}\" is not an opc.tcp url", self.endpoint_url);
            valid = false;
        }
        if self.security_policy == SecurityPolicy::Unknown {
            error!("Security policy is unknown");
            valid = false;
        }
        match self.security_mode {
            MessageSecurityMode::Invalid => {
                error!("Security mode is invalid");
                valid = false;
            }
            MessageSecurityMode::None if self.security_policy != SecurityPolicy::None => {
                error!(
                    "Security mode None cannot be combined with policy {}",
                    self.security_policy
                );
                valid = false;
            }
            MessageSecurityMode::Sign | MessageSecurityMode::SignAndEncrypt
                if self.security_policy == SecurityPolicy::None =>
            {
                error!(
                    "Security mode {} requires a security policy",
                    self.security_mode
                );
                valid = false;
            }
            _ => {}
        }
        if !self.connection_strategy.is_valid() {
            valid = false;
        }
        if self.max_inflight_publish == 0 {
            error!("At least one publish request must be allowed in flight");
            valid = false;
        }
        if self.max_monitored_items_per_call == 0 {
            error!("Max monitored items per call must be greater than 0");
            valid = false;
        }
        if self.event_channel_capacity == 0 {
            error!("Event channel capacity must be greater than 0");
            valid = false;
        }
        if self.user_tokens.contains_key(ANONYMOUS_USER_TOKEN_ID) {
            error!(
                "User tokens contains the reserved \"{}\" id",
                ANONYMOUS_USER_TOKEN_ID
            );
            valid = false;
        }
        if self.user_tokens.contains_key("") {
            error!("User tokens contains a token with an empty id");
            valid = false;
        }
        self.user_tokens.values().for_each(|token| {
            if !token.is_valid() {
                valid = false;
            }
        });
        if !self.default_user_token.is_empty()
            && self.default_user_token != ANONYMOUS_USER_TOKEN_ID
            && !self.user_tokens.contains_key(&self.default_user_token)
        {
            error!(
                "Default user token id {} does not exist in list of user tokens",
                self.default_user_token
            );
            valid = false;
        }
        valid
    }

    fn application_name(&self) -> String {
        self.application_name.clone()
    }

    fn application_uri(&self) -> String {
        self.application_uri.clone()
    }

    fn product_uri(&self) -> String {
        self.product_uri.clone()
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Client
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl ClientConfig {
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 60_000;
    pub const DEFAULT_SESSION_TIMEOUT_MS: u32 = 60_000;
    pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u32 = 5_000;
    pub const DEFAULT_MAX_INFLIGHT_PUBLISH: usize = 5;
    pub const DEFAULT_RECONNECTION_RETRY_DELAY_MS: u32 = 1_000;
    pub const DEFAULT_CLOCK_ADJUSTMENT_INTERVAL_MS: u32 = 30_000;
    pub const DEFAULT_MAX_MONITORED_ITEMS_PER_CALL: usize = 1_000;
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

    pub fn new<T>(application_name: T, application_uri: T) -> Self
    where
        T: Into<String>,
    {
        ClientConfig {
            application_name: application_name.into(),
            application_uri: application_uri.into(),
            product_uri: String::new(),
            session_name: "Rust OPC UA Client".into(),
            endpoint_url: String::new(),
            security_mode: MessageSecurityMode::None,
            security_policy: SecurityPolicy::None,
            connection_strategy: ConnectionStrategy::default(),
            reconnect_on_failure: true,
            keep_pending_sessions_on_disconnect: false,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT_MS,
            session_timeout: Self::DEFAULT_SESSION_TIMEOUT_MS,
            keep_session_alive: false,
            keep_alive_interval: Self::DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            max_inflight_publish: Self::DEFAULT_MAX_INFLIGHT_PUBLISH,
            reconnection_retry_delay: Self::DEFAULT_RECONNECTION_RETRY_DELAY_MS,
            clock_adjustment_interval: Self::DEFAULT_CLOCK_ADJUSTMENT_INTERVAL_MS,
            max_monitored_items_per_call: Self::DEFAULT_MAX_MONITORED_ITEMS_PER_CALL,
            event_channel_capacity: Self::DEFAULT_EVENT_CHANNEL_CAPACITY,
            trust_server_certs: false,
            preferred_locales: Vec::new(),
            default_user_token: String::new(),
            user_tokens: BTreeMap::new(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout as u64)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval as u64)
    }

    pub fn reconnection_retry_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_retry_delay as u64)
    }

    /// `None` when clock adjustment is disabled.
    pub fn clock_adjustment_interval(&self) -> Option<Duration> {
        if self.clock_adjustment_interval == 0 {
            None
        } else {
            Some(Duration::from_millis(self.clock_adjustment_interval as u64))
        }
    }

    /// True if the configured endpoint requires certificates to be exchanged.
    pub fn requires_security(&self) -> bool {
        self.security_mode != MessageSecurityMode::None
    }

    /// The identity of the default user token, anonymous if none is configured.
    pub fn default_identity_token(&self) -> IdentityToken {
        self.user_tokens
            .get(&self.default_user_token)
            .map(|t| t.identity_token())
            .unwrap_or(IdentityToken::Anonymous)
    }
}
