// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The PKI boundary used during connection setup. The connection asks the manager to vouch for
//! the server certificate and, when security is required and the client has no identity yet, to
//! create one.

use std::collections::HashSet;

use rand::Rng;

use crate::{sync::RwLock, types::StatusCode};

/// Parameters for a self-signed application instance certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfSignedCertificateParams {
    pub application_uri: String,
    pub application_name: String,
    /// Host names and addresses the certificate is valid for.
    pub subject_alt_names: Vec<String>,
    pub valid_days: u32,
}

impl SelfSignedCertificateParams {
    pub fn new(application_uri: &str, application_name: &str) -> Self {
        SelfSignedCertificateParams {
            application_uri: application_uri.to_string(),
            application_name: application_name.to_string(),
            subject_alt_names: vec!["localhost".to_string()],
            valid_days: 365,
        }
    }
}

/// Certificate checks and issuance needed by the connection manager. Failures from either call
/// are terminal for the connect attempt, they are never retried.
pub trait CertificateManager: Send + Sync {
    /// Checks a DER encoded certificate. `Good` means it may be used.
    fn check_certificate(&self, certificate: &[u8]) -> StatusCode;

    /// Creates a self-signed certificate for the client and adopts it as its own.
    fn create_self_signed_certificate(
        &self,
        params: &SelfSignedCertificateParams,
    ) -> Result<Vec<u8>, StatusCode>;

    /// The client's own certificate if it has one.
    fn own_certificate(&self) -> Option<Vec<u8>>;
}

/// Payload of the identity blob issued by [`InMemoryCertificateManager`].
#[derive(Debug, Serialize, Deserialize)]
struct IssuedIdentity {
    serial: u64,
    subject: String,
    application_uri: String,
    subject_alt_names: Vec<String>,
    not_before: chrono::DateTime<chrono::Utc>,
    not_after: chrono::DateTime<chrono::Utc>,
}

/// A certificate manager holding its trust list in memory. Certificates that are neither trusted
/// nor rejected are either auto-trusted or moved to the rejected list, depending on
/// `trust_unknown_certs`.
pub struct InMemoryCertificateManager {
    trusted: RwLock<HashSet<Vec<u8>>>,
    rejected: RwLock<HashSet<Vec<u8>>>,
    own_certificate: RwLock<Option<Vec<u8>>>,
    trust_unknown_certs: bool,
}

impl InMemoryCertificateManager {
    pub fn new(trust_unknown_certs: bool) -> Self {
        Self {
            trusted: RwLock::new(HashSet::new()),
            rejected: RwLock::new(HashSet::new()),
            own_certificate: RwLock::new(None),
            trust_unknown_certs,
        }
    }

    pub fn trust_certificate(&self, certificate: &[u8]) {
        trace_write_lock!(self.rejected).remove(certificate);
        trace_write_lock!(self.trusted).insert(certificate.to_vec());
    }

    pub fn reject_certificate(&self, certificate: &[u8]) {
        trace_write_lock!(self.trusted).remove(certificate);
        trace_write_lock!(self.rejected).insert(certificate.to_vec());
    }

    pub fn is_rejected(&self, certificate: &[u8]) -> bool {
        trace_read_lock!(self.rejected).contains(certificate)
    }
}

impl CertificateManager for InMemoryCertificateManager {
    fn check_certificate(&self, certificate: &[u8]) -> StatusCode {
        if certificate.is_empty() {
            error!("Server supplied an empty certificate");
            return StatusCode::BadCertificateInvalid;
        }
        if trace_read_lock!(self.trusted).contains(certificate) {
            return StatusCode::Good;
        }
        if self.is_rejected(certificate) {
            warn!("Certificate is in the rejected list");
            return StatusCode::BadCertificateUntrusted;
        }
        if self.trust_unknown_certs {
            info!("Unknown certificate is trusted because trust_unknown_certs is set");
            self.trust_certificate(certificate);
            StatusCode::Good
        } else {
            warn!("Unknown certificate has been moved to the rejected list");
            self.reject_certificate(certificate);
            StatusCode::BadCertificateUntrusted
        }
    }

    fn create_self_signed_certificate(
        &self,
        params: &SelfSignedCertificateParams,
    ) -> Result<Vec<u8>, StatusCode> {
        if params.application_uri.is_empty() || params.valid_days == 0 {
            error!(
                "Cannot create a certificate for application uri \"{}\", valid for {} days",
                params.application_uri, params.valid_days
            );
            return Err(StatusCode::BadConfigurationError);
        }
        let not_before = chrono::Utc::now();
        let identity = IssuedIdentity {
            serial: rand::rng().random(),
            subject: format!("CN={}", params.application_name),
            application_uri: params.application_uri.clone(),
            subject_alt_names: params.subject_alt_names.clone(),
            not_before,
            not_after: not_before + chrono::Duration::days(params.valid_days as i64),
        };
        let certificate = serde_json::to_vec(&identity).map_err(|err| {
            error!("Cannot serialize the issued certificate, error = {}", err);
            StatusCode::BadInternalError
        })?;
        debug!(
            "Created self-signed certificate {} for {}",
            identity.serial, identity.application_uri
        );
        *trace_write_lock!(self.own_certificate) = Some(certificate.clone());
        Ok(certificate)
    }

    fn own_certificate(&self) -> Option<Vec<u8>> {
        trace_read_lock!(self.own_certificate).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_certificates() {
        let strict = InMemoryCertificateManager::new(false);
        assert_eq!(
            strict.check_certificate(b"server"),
            StatusCode::BadCertificateUntrusted
        );
        assert!(strict.is_rejected(b"server"));
        strict.trust_certificate(b"server");
        assert_eq!(strict.check_certificate(b"server"), StatusCode::Good);

        let lenient = InMemoryCertificateManager::new(true);
        assert_eq!(lenient.check_certificate(b"server"), StatusCode::Good);
        assert_eq!(
            lenient.check_certificate(&[]),
            StatusCode::BadCertificateInvalid
        );
    }

    #[test]
    fn self_signed() {
        let manager = InMemoryCertificateManager::new(false);
        assert!(manager.own_certificate().is_none());
        let params = SelfSignedCertificateParams::new("urn:client", "client");
        let cert = manager.create_self_signed_certificate(&params).unwrap();
        assert_eq!(manager.own_certificate(), Some(cert));

        let bad = SelfSignedCertificateParams::new("", "client");
        assert_eq!(
            manager.create_self_signed_certificate(&bad),
            Err(StatusCode::BadConfigurationError)
        );
    }
}
