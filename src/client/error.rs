// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    client::transport::TransportError,
    types::{DiagnosticInfo, StatusCode},
};

/// The error returned by client operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A service call failed, either with a bad service result or because the transaction could
    /// not be completed.
    #[error("{request} failed with {status}")]
    Service {
        request: &'static str,
        status: StatusCode,
        diagnostics: Option<DiagnosticInfo>,
    },
    /// The server answered with a response of the wrong kind.
    #[error("{request} received an unexpected {response}")]
    UnexpectedResponse {
        request: &'static str,
        response: &'static str,
    },
    #[error("connection was aborted")]
    ConnectionAborted,
    #[error("server is unreachable: {0}")]
    ServerUnreachable(String),
    #[error("connection was rejected: {0}")]
    ConnectionRejected(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("server certificate was rejected with {0}")]
    CertificateRejected(StatusCode),
    #[error("reconnection was canceled")]
    ReconnectionCanceled,
    #[error("session repair is already in progress")]
    RepairInProgress,
    #[error("{0}")]
    Status(StatusCode),
}

impl Error {
    /// A status code representative of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Service { status, .. } => *status,
            Error::UnexpectedResponse { .. } => StatusCode::BadUnknownResponse,
            Error::ConnectionAborted => StatusCode::BadConnectionClosed,
            Error::ServerUnreachable(_) => StatusCode::BadNotConnected,
            Error::ConnectionRejected(_) => StatusCode::BadConnectionRejected,
            Error::InvalidState(_) => StatusCode::BadInvalidState,
            Error::Configuration(_) => StatusCode::BadConfigurationError,
            Error::CertificateRejected(status) => *status,
            Error::ReconnectionCanceled => StatusCode::BadRequestInterrupted,
            Error::RepairInProgress => StatusCode::BadInvalidState,
            Error::Status(status) => *status,
        }
    }

    /// True when the server has declared the session dead.
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self.status(),
            StatusCode::BadSessionIdInvalid | StatusCode::BadSessionClosed
        )
    }
}

impl From<StatusCode> for Error {
    fn from(status: StatusCode) -> Self {
        Error::Status(status)
    }
}

impl From<TransportError> for Error {
    /// Classifies a failure to open a channel.
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => Error::ConnectionAborted,
            TransportError::Refused(reason) => Error::ServerUnreachable(reason),
            err => Error::ConnectionRejected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert_eq!(
            Error::from(TransportError::Aborted),
            Error::ConnectionAborted
        );
        assert!(matches!(
            Error::from(TransportError::Refused("no route".into())),
            Error::ServerUnreachable(_)
        ));
        assert!(matches!(
            Error::from(TransportError::DisconnectedByThirdParty),
            Error::ConnectionRejected(_)
        ));
    }

    #[test]
    fn status_mapping() {
        let err = Error::Service {
            request: "ReadRequest",
            status: StatusCode::BadSessionIdInvalid,
            diagnostics: None,
        };
        assert!(err.is_session_invalid());
        assert_eq!(err.to_string(), "ReadRequest failed with BadSessionIdInvalid");
        assert_eq!(
            Error::from(StatusCode::BadTimeout).status(),
            StatusCode::BadTimeout
        );
    }
}
