// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The boundary between the client and the secure channel. Encoding messages and negotiating the
//! security token are the business of the implementation behind these traits. The client only
//! opens channels, performs message transactions over them and listens to their lifecycle events.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    core::supported_message::SupportedMessage,
    crypto::SecurityPolicy,
    types::{MessageSecurityMode, StatusCode},
};

/// Events emitted by an open channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection was aborted locally.
    Abort,
    /// The channel closed. `Some` carries the error when the channel was lost rather than closed
    /// on request.
    Close(Option<StatusCode>),
    /// 75% of the security token lifetime has elapsed and the token is about to be renewed.
    Lifetime75 { token_id: u32 },
    SecurityTokenRenewed { token_id: u32 },
    SendChunk(usize),
    ReceiveChunk(usize),
    SendRequest {
        request: &'static str,
        request_handle: u32,
    },
    ReceiveResponse {
        response: &'static str,
        request_handle: u32,
    },
}

/// What a channel is opened against.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOptions {
    pub endpoint_url: String,
    pub security_policy: SecurityPolicy,
    pub security_mode: MessageSecurityMode,
    pub client_certificate: Option<Vec<u8>>,
    pub server_certificate: Option<Vec<u8>>,
    pub request_timeout: Duration,
}

/// Failure to open a secure channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("connection aborted")]
    Aborted,
    #[error("connection refused: {0}")]
    Refused(String),
    /// The socket was closed by the peer or something between the peer and the client.
    #[error("socket disconnected by third party")]
    DisconnectedByThirdParty,
    #[error("{message} ({status})")]
    Status { status: StatusCode, message: String },
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::Aborted => StatusCode::BadConnectionClosed,
            TransportError::Refused(_) => StatusCode::BadConnectionRejected,
            TransportError::DisconnectedByThirdParty => StatusCode::BadConnectionClosed,
            TransportError::Status { status, .. } => *status,
        }
    }

    /// True when the server may have rotated its certificate, so it has to be fetched again
    /// before the next attempt.
    pub fn requires_certificate_refetch(&self) -> bool {
        matches!(self, TransportError::DisconnectedByThirdParty)
            || self.status() == StatusCode::BadCertificateInvalid
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionAborted => TransportError::Aborted,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::AddrNotAvailable => TransportError::Refused(err.to_string()),
            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => {
                TransportError::DisconnectedByThirdParty
            }
            _ => {
                let message = err.to_string();
                TransportError::Status {
                    status: StatusCode::from(err),
                    message,
                }
            }
        }
    }
}

/// An open secure channel.
#[async_trait]
pub trait SecureChannel: Send + Sync {
    /// Performs a message transaction, returning the response or the status the transaction
    /// failed with. `BadTimeout` is returned when no response arrives within `timeout`.
    async fn send(
        &self,
        request: SupportedMessage,
        timeout: Duration,
    ) -> Result<SupportedMessage, StatusCode>;

    fn is_opened(&self) -> bool;

    fn is_transaction_in_progress(&self) -> bool;

    /// Closes the channel gracefully.
    async fn close(&self) -> Result<(), StatusCode>;

    /// Aborts the underlying connection without closing the channel.
    async fn abort(&self);

    /// Releases the resources held by the channel. The channel emits no further events.
    fn dispose(&self);

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

/// Opens secure channels.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn create(
        &self,
        options: &ChannelOptions,
    ) -> Result<Arc<dyn SecureChannel>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            TransportError::from(refused),
            TransportError::Refused(_)
        ));
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(TransportError::from(aborted), TransportError::Aborted);
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(TransportError::from(reset).requires_certificate_refetch());
        let timeout = TransportError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(timeout.status(), StatusCode::BadTimeout);
        assert!(!timeout.requires_certificate_refetch());
    }

    #[test]
    fn certificate_refetch() {
        let err = TransportError::Status {
            status: StatusCode::BadCertificateInvalid,
            message: "bad cert".into(),
        };
        assert!(err.requires_certificate_refetch());
    }
}
