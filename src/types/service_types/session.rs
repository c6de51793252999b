// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Discovery and session service types.

use crate::types::{
    node_id::NodeId,
    service_types::{
        ApplicationType, LocalizedText, MessageSecurityMode, RequestHeader, ResponseHeader,
        UserTokenType,
    },
    status_code::StatusCode,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationDescription {
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: LocalizedText,
    pub application_type: ApplicationType,
    pub gateway_server_uri: Option<String>,
    pub discovery_profile_uri: Option<String>,
    pub discovery_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserTokenPolicy {
    pub policy_id: String,
    pub token_type: UserTokenType,
    pub issued_token_type: Option<String>,
    pub issuer_endpoint_url: Option<String>,
    pub security_policy_uri: Option<String>,
}

impl UserTokenPolicy {
    pub fn anonymous() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: "anonymous".to_string(),
            token_type: UserTokenType::Anonymous,
            issued_token_type: None,
            issuer_endpoint_url: None,
            security_policy_uri: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointDescription {
    pub endpoint_url: String,
    pub server: ApplicationDescription,
    /// DER encoded server certificate.
    pub server_certificate: Option<Vec<u8>>,
    pub security_mode: MessageSecurityMode,
    pub security_policy_uri: String,
    pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
    pub transport_profile_uri: String,
    pub security_level: u8,
}

impl EndpointDescription {
    /// Finds the policy id of the first user token policy matching the token type.
    pub fn find_policy_id(&self, token_type: UserTokenType) -> Option<String> {
        self.user_identity_tokens.as_ref().and_then(|tokens| {
            tokens
                .iter()
                .find(|t| t.token_type == token_type)
                .map(|t| t.policy_id.clone())
        })
    }
}

impl<'a> From<(&'a str, &'a str, MessageSecurityMode)> for EndpointDescription {
    fn from(v: (&'a str, &'a str, MessageSecurityMode)) -> Self {
        EndpointDescription {
            endpoint_url: v.0.to_string(),
            security_policy_uri: v.1.to_string(),
            security_mode: v.2,
            user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetEndpointsRequest {
    pub request_header: RequestHeader,
    pub endpoint_url: String,
    pub locale_ids: Option<Vec<String>>,
    pub profile_uris: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetEndpointsResponse {
    pub response_header: ResponseHeader,
    pub endpoints: Option<Vec<EndpointDescription>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureData {
    pub algorithm: Option<String>,
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionRequest {
    pub request_header: RequestHeader,
    pub client_description: ApplicationDescription,
    pub server_uri: Option<String>,
    pub endpoint_url: String,
    pub session_name: String,
    pub client_nonce: Option<Vec<u8>>,
    pub client_certificate: Option<Vec<u8>>,
    /// Requested session timeout in milliseconds.
    pub requested_session_timeout: f64,
    pub max_response_message_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionResponse {
    pub response_header: ResponseHeader,
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub revised_session_timeout: f64,
    pub server_nonce: Option<Vec<u8>>,
    pub server_certificate: Option<Vec<u8>>,
    pub server_endpoints: Option<Vec<EndpointDescription>>,
    pub server_signature: SignatureData,
    pub max_request_message_size: u32,
}

/// The identity presented in ActivateSession.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIdentityToken {
    Anonymous {
        policy_id: String,
    },
    UserName {
        policy_id: String,
        user_name: String,
        password: String,
    },
    X509 {
        policy_id: String,
        certificate_data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionRequest {
    pub request_header: RequestHeader,
    pub client_signature: SignatureData,
    pub locale_ids: Option<Vec<String>>,
    pub user_identity_token: UserIdentityToken,
    pub user_token_signature: SignatureData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionResponse {
    pub response_header: ResponseHeader,
    pub server_nonce: Option<Vec<u8>>,
    pub results: Option<Vec<StatusCode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionRequest {
    pub request_header: RequestHeader,
    pub delete_subscriptions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionResponse {
    pub response_header: ResponseHeader,
}
