// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::atomic::Ordering;

use rand::Rng;

use crate::{
    client::{
        process_service_result, process_unexpected_response,
        session::{session_debug, session_error, session_warn},
        Error, IdentityToken, Session,
    },
    core::{config::Config, supported_message::SupportedMessage},
    types::{
        ActivateSessionRequest, CloseSessionRequest, CreateSessionRequest, NodeId, SignatureData,
        StatusCode, UserIdentityToken, UserTokenType,
    },
};

impl Session {
    /// Sends a [`CreateSessionRequest`] to the server, returning the session id of the created
    /// session. Internally, the session will store the authentication token which is used for requests
    /// subsequent to this call.
    ///
    /// See OPC UA Part 4 - Services 5.6.2 for complete description of the service and error responses.
    ///
    /// # Returns
    ///
    /// * `Ok(NodeId)` - Success, session id
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub(crate) async fn create_session(&self) -> Result<NodeId, Error> {
        let Some(connection) = self.connection() else {
            return Err(Error::Service {
                request: "CreateSessionRequest",
                status: StatusCode::BadNotConnected,
                diagnostics: None,
            });
        };
        let config = connection.config();
        let endpoint_url = connection
            .endpoint()
            .map(|e| e.endpoint_url)
            .unwrap_or_else(|| config.endpoint_url.clone());

        let secure = config.requires_security();
        let client_nonce = secure.then(|| rand::rng().random::<[u8; 32]>().to_vec());
        let client_certificate = if secure {
            connection.certificate_manager().own_certificate()
        } else {
            None
        };

        let request = CreateSessionRequest {
            request_header: self.make_request_header(),
            client_description: config.application_description(),
            server_uri: None,
            endpoint_url,
            session_name: self.session_name.clone(),
            client_nonce,
            client_certificate,
            requested_session_timeout: self.requested_session_timeout as f64,
            max_response_message_size: 0,
        };

        let response = self.send_raw(request.into()).await?;
        if let SupportedMessage::CreateSessionResponse(response) = response {
            process_service_result("CreateSessionRequest", &response.response_header)?;

            if secure {
                if let Some(server_certificate) = response.server_certificate.as_deref() {
                    let status = connection
                        .certificate_manager()
                        .check_certificate(server_certificate);
                    if status.is_bad() {
                        session_error!(
                            self,
                            "server certificate of the session was rejected with {}",
                            status
                        );
                        return Err(Error::CertificateRejected(status));
                    }
                }
            }

            let session_id = response.session_id.clone();
            self.session_id.store(std::sync::Arc::new(response.session_id));
            self.auth_token
                .store(std::sync::Arc::new(response.authentication_token));
            *trace_write_lock!(self.server_nonce) = response.server_nonce;
            if response.revised_session_timeout > 0.0 {
                self.timeout.store(
                    response.revised_session_timeout as u64,
                    Ordering::Relaxed,
                );
            }
            session_debug!(
                self,
                "created session {}, revised timeout {}ms",
                session_id,
                self.timeout.load(Ordering::Relaxed)
            );
            Ok(session_id)
        } else {
            Err(process_unexpected_response("CreateSessionRequest", response))
        }
    }

    /// Sends an [`ActivateSessionRequest`] to the server to activate this session with the
    /// identity token of the session.
    ///
    /// See OPC UA Part 4 - Services 5.6.3 for complete description of the service and error responses.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Success
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub(crate) async fn activate_session(&self) -> Result<(), Error> {
        let user_identity_token = self.user_identity_token()?;
        let locale_ids = if self.preferred_locales.is_empty() {
            None
        } else {
            Some(self.preferred_locales.clone())
        };

        let request = ActivateSessionRequest {
            request_header: self.make_request_header(),
            client_signature: SignatureData::default(),
            locale_ids,
            user_identity_token,
            user_token_signature: SignatureData::default(),
        };

        let response = self.send_raw(request.into()).await?;
        if let SupportedMessage::ActivateSessionResponse(response) = response {
            process_service_result("ActivateSessionRequest", &response.response_header)?;
            if response.server_nonce.is_some() {
                *trace_write_lock!(self.server_nonce) = response.server_nonce;
            }
            session_debug!(self, "session activated");
            Ok(())
        } else {
            Err(process_unexpected_response(
                "ActivateSessionRequest",
                response,
            ))
        }
    }

    /// The identity token matching the session's identity and the user token policies the
    /// endpoint advertises.
    fn user_identity_token(&self) -> Result<UserIdentityToken, Error> {
        let endpoint = self.connection().and_then(|c| c.endpoint());
        let policy_id = |token_type: UserTokenType, default: &str| {
            endpoint
                .as_ref()
                .and_then(|e| e.find_policy_id(token_type))
                .unwrap_or_else(|| default.to_string())
        };
        let token = match &self.identity_token {
            IdentityToken::Anonymous => UserIdentityToken::Anonymous {
                policy_id: policy_id(UserTokenType::Anonymous, "anonymous"),
            },
            IdentityToken::UserName(user_name, password) => UserIdentityToken::UserName {
                policy_id: policy_id(UserTokenType::UserName, "username"),
                user_name: user_name.clone(),
                password: password.clone(),
            },
            IdentityToken::X509(cert_path, _) => {
                let certificate_data = std::fs::read(cert_path).map_err(|err| {
                    session_error!(
                        self,
                        "cannot read the user certificate {}, {}",
                        cert_path.display(),
                        err
                    );
                    Error::Configuration(format!(
                        "cannot read user certificate {}",
                        cert_path.display()
                    ))
                })?;
                UserIdentityToken::X509 {
                    policy_id: policy_id(UserTokenType::Certificate, "x509"),
                    certificate_data,
                }
            }
        };
        Ok(token)
    }

    /// Closes the session. A `CloseSessionRequest` is sent when the channel is usable, the
    /// session is considered closed whatever the server answers. Subscriptions of the session
    /// are terminated locally.
    ///
    /// See OPC UA Part 4 - Services 5.6.4 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `delete_subscriptions` - Asks the server to delete the subscriptions of the session.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The server confirmed the close, or there was no channel to send it on.
    /// * `Err(Error)` - The close request failed, the session is closed regardless.
    ///
    pub async fn close(&self, delete_subscriptions: bool) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::InvalidState("session is already closed".to_string()));
        }
        self.stop_keep_alive();
        if let Some(engine) = self.publish_engine_if_created() {
            engine.suspend(true);
        }

        let result = if self.is_channel_valid() && !self.is_reconnecting() {
            let request = CloseSessionRequest {
                request_header: self.make_request_header(),
                delete_subscriptions,
            };
            match self.send(request).await {
                Ok(SupportedMessage::CloseSessionResponse(response)) => {
                    process_service_result("CloseSessionRequest", &response.response_header)
                }
                Ok(response) => Err(process_unexpected_response(
                    "CloseSessionRequest",
                    response,
                )),
                Err(err) => Err(err),
            }
        } else {
            session_warn!(
                self,
                "closing the session without a usable channel, the server will time it out"
            );
            Ok(())
        };

        let status = match &result {
            Ok(()) => StatusCode::Good,
            Err(err) => err.status(),
        };
        self.mark_closed(status);
        result
    }
}
