// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Security policies and the certificate management boundary. Signing and encryption are done by
//! the secure channel implementation.

pub mod certificate_manager;
pub mod security_policy;

pub use self::{
    certificate_manager::{CertificateManager, InMemoryCertificateManager, SelfSignedCertificateParams},
    security_policy::*,
};
