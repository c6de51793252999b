// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Endpoint discovery and server certificate retrieval.

use std::sync::atomic::Ordering;

use crate::{
    client::{
        connection::{connection_debug, connection_info, connection_warn, ClientConnection},
        process_service_result,
        retry::ConnectionStrategy,
        Error,
    },
    core::{
        comms::url::{
            hostname_from_url, server_url_from_endpoint_url, url_matches_except_host,
            url_with_replaced_hostname,
        },
        supported_message::SupportedMessage,
    },
    crypto::SecurityPolicy,
    types::{EndpointDescription, GetEndpointsRequest, MessageSecurityMode, RequestHeader},
};

/// Picks the endpoint matching the security mode and policy, preferring endpoints whose url
/// matches `endpoint_url` except for the host. When several match, the last one is kept.
///
/// The server may advertise a hostname the client cannot reach, so the hostname of the chosen
/// endpoint is replaced with the one of `endpoint_url`.
pub(crate) fn select_endpoint(
    endpoints: &[EndpointDescription],
    endpoint_url: &str,
    security_mode: MessageSecurityMode,
    security_policy: SecurityPolicy,
) -> Result<EndpointDescription, Error> {
    let secure_matches: Vec<&EndpointDescription> = endpoints
        .iter()
        .filter(|e| {
            e.security_mode == security_mode
                && SecurityPolicy::from_uri(&e.security_policy_uri) == security_policy
        })
        .collect();
    let url_matches: Vec<&EndpointDescription> = secure_matches
        .iter()
        .copied()
        .filter(|e| url_matches_except_host(endpoint_url, &e.endpoint_url))
        .collect();
    let matches = if url_matches.is_empty() {
        secure_matches
    } else {
        url_matches
    };
    let mut endpoint = match matches.as_slice() {
        [] => {
            return Err(Error::Configuration(format!(
                "server has no endpoint with security mode {} and policy {}",
                security_mode, security_policy
            )))
        }
        [endpoint] => (*endpoint).clone(),
        [.., last] => {
            warn!(
                "{} endpoints match security mode {} and policy {}, using {}",
                matches.len(),
                security_mode,
                security_policy,
                last.endpoint_url
            );
            (*last).clone()
        }
    };
    if let Ok(hostname) = hostname_from_url(endpoint_url) {
        match url_with_replaced_hostname(&endpoint.endpoint_url, &hostname) {
            Ok(url) => endpoint.endpoint_url = url,
            Err(status) => debug!(
                "Endpoint url {} keeps its hostname, {}",
                endpoint.endpoint_url, status
            ),
        }
    }
    Ok(endpoint)
}

impl ClientConnection {
    /// Fetches the endpoints of the server by sending a [`GetEndpointsRequest`].
    ///
    /// See OPC UA Part 4 - Services 5.4.4 for complete description of the service and error responses.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<EndpointDescription>)` - A list of endpoints supported by the server
    /// * `Err(Error)` - Request failed, the error says why.
    ///
    pub async fn get_endpoints(&self) -> Result<Vec<EndpointDescription>, Error> {
        connection_debug!(self, "get_endpoints()");
        let request = GetEndpointsRequest {
            request_header: RequestHeader {
                timestamp: self.adjusted_now(),
                timeout_hint: self.config.request_timeout,
                ..Default::default()
            },
            endpoint_url: server_url_from_endpoint_url(&self.config.endpoint_url)
                .unwrap_or_else(|_| self.config.endpoint_url.clone()),
            locale_ids: None,
            profile_uris: None,
        };
        let response = self
            .send_request_on_channel(request.into(), |response| match response {
                SupportedMessage::GetEndpointsResponse(response) => Ok(response),
                response => Err(response),
            })
            .await?;
        process_service_result("GetEndpointsRequest", &response.response_header)?;
        let endpoints = response.endpoints.unwrap_or_default();
        connection_debug!(self, "server has {} endpoints", endpoints.len());
        *trace_write_lock!(self.server_endpoints) = endpoints.clone();
        Ok(endpoints)
    }

    /// True once the endpoints of the server have been fetched.
    pub fn knows_server_endpoint(&self) -> bool {
        !trace_read_lock!(self.server_endpoints).is_empty()
    }

    /// The endpoints returned by the last call to `get_endpoints()`.
    pub fn server_endpoints(&self) -> Vec<EndpointDescription> {
        trace_read_lock!(self.server_endpoints).clone()
    }

    /// Obtains the server certificate through a short lived, unsecured discovery connection to
    /// the same endpoint url. The endpoint matching the configured security is adopted once the
    /// certificate manager accepts its certificate.
    pub async fn fetch_server_certificate(&self) -> Result<(), Error> {
        connection_info!(self, "fetching the server certificate from {}", self.config.endpoint_url);
        let mut config = self.config.clone();
        config.security_mode = MessageSecurityMode::None;
        config.security_policy = SecurityPolicy::None;
        config.connection_strategy = ConnectionStrategy::never();
        config.reconnect_on_failure = false;
        config.keep_session_alive = false;
        config.clock_adjustment_interval = 0;

        let fetcher = ClientConnection::new(
            config,
            self.channel_factory.clone(),
            self.certificate_manager.clone(),
        )?;
        let endpoints = match fetcher.open_discovery_channel().await {
            Ok(()) => fetcher.get_endpoints().await,
            Err(err) => Err(err),
        };
        if let Err(err) = fetcher.disconnect().await {
            connection_warn!(self, "discovery connection did not close cleanly, {}", err);
        }
        let endpoints = endpoints?;

        let endpoint = select_endpoint(
            &endpoints,
            &self.config.endpoint_url,
            self.config.security_mode,
            self.config.security_policy,
        )?;
        let certificate = endpoint.server_certificate.clone().unwrap_or_default();
        let status = self.certificate_manager.check_certificate(&certificate);
        if status.is_bad() {
            connection_warn!(self, "server certificate was rejected, {}", status);
            return Err(Error::CertificateRejected(status));
        }

        *trace_write_lock!(self.server_certificate) = Some(certificate);
        *trace_write_lock!(self.endpoint) = Some(endpoint);
        *trace_write_lock!(self.server_endpoints) = endpoints;
        self.refetch_server_certificate
            .store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Forgets the server certificate so the next attempt fetches it again.
    pub(crate) fn clear_server_certificate(&self) {
        *trace_write_lock!(self.server_certificate) = None;
    }
}
