// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The request and response structures exchanged with the server, together with the common
//! header types. These are data definitions only, encoding them is the business of the
//! transport.

use crate::types::{
    data_value::DateTime, node_id::NodeId, status_code::StatusCode,
};

mod attribute;
mod enums;
mod method;
mod monitored_item;
mod session;
mod subscription;
mod view;

pub use self::{
    attribute::*, enums::*, method::*, monitored_item::*, session::*, subscription::*, view::*,
};

bitflags! {
    /// Mask of the diagnostics the client wants the server to return.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DiagnosticBits: u32 {
        const SERVICE_LEVEL_SYMBOLIC_ID = 0x0000_0001;
        const SERVICE_LEVEL_LOCALIZED_TEXT = 0x0000_0002;
        const SERVICE_LEVEL_ADDITIONAL_INFO = 0x0000_0004;
        const SERVICE_LEVEL_INNER_STATUS_CODE = 0x0000_0008;
        const SERVICE_LEVEL_INNER_DIAGNOSTICS = 0x0000_0010;
        const OPERATIONAL_LEVEL_SYMBOLIC_ID = 0x0000_0020;
        const OPERATIONAL_LEVEL_LOCALIZED_TEXT = 0x0000_0040;
        const OPERATIONAL_LEVEL_ADDITIONAL_INFO = 0x0000_0080;
        const OPERATIONAL_LEVEL_INNER_STATUS_CODE = 0x0000_0100;
        const OPERATIONAL_LEVEL_INNER_DIAGNOSTICS = 0x0000_0200;
    }
}

/// Diagnostic information the server may attach to a response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub locale: Option<i32>,
    pub localized_text: Option<i32>,
    pub additional_info: Option<String>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }

    pub fn is_null(&self) -> bool {
        *self == DiagnosticInfo::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub locale: String,
    pub text: String,
}

impl LocalizedText {
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText {
            locale: locale.to_string(),
            text: text.to_string(),
        }
    }
}

impl<'a> From<&'a str> for LocalizedText {
    fn from(value: &'a str) -> Self {
        LocalizedText::new("", value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: &str) -> QualifiedName {
        QualifiedName {
            namespace_index,
            name: name.to_string(),
        }
    }
}

/// The header passed with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    /// The secret session identifier used to verify that the request is associated with the session.
    pub authentication_token: NodeId,
    /// The time the client sent the request.
    pub timestamp: DateTime,
    /// A handle associated with the request, returned in the response.
    pub request_handle: u32,
    pub return_diagnostics: DiagnosticBits,
    pub audit_entry_id: Option<String>,
    /// Hint in milliseconds of how long the client is prepared to wait. Zero means no timeout.
    pub timeout_hint: u32,
}

impl Default for RequestHeader {
    fn default() -> Self {
        RequestHeader {
            authentication_token: NodeId::null(),
            timestamp: chrono::Utc::now(),
            request_handle: 0,
            return_diagnostics: DiagnosticBits::empty(),
            audit_entry_id: None,
            timeout_hint: 0,
        }
    }
}

/// The header passed with every response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub timestamp: DateTime,
    pub request_handle: u32,
    pub service_result: StatusCode,
    pub service_diagnostics: DiagnosticInfo,
    pub string_table: Option<Vec<String>>,
}

impl Default for ResponseHeader {
    fn default() -> Self {
        ResponseHeader {
            timestamp: chrono::Utc::now(),
            request_handle: 0,
            service_result: StatusCode::Good,
            service_diagnostics: DiagnosticInfo::null(),
            string_table: None,
        }
    }
}

impl ResponseHeader {
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        Self::new_service_result(request_header, StatusCode::Good)
    }

    pub fn new_service_result(
        request_header: &RequestHeader,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            request_handle: request_header.request_handle,
            service_result,
            ..Default::default()
        }
    }
}

/// Response returned by the server for any request that it cannot process.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn new(request_header: &RequestHeader, service_result: StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(request_header, service_result),
        }
    }
}
