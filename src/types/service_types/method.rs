// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    data_value::Variant,
    node_id::NodeId,
    service_types::{DiagnosticInfo, RequestHeader, ResponseHeader},
    status_code::StatusCode,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Option<Vec<Variant>>,
}

impl<T> From<(NodeId, NodeId, Option<Vec<T>>)> for CallMethodRequest
where
    T: Into<Variant>,
{
    fn from(v: (NodeId, NodeId, Option<Vec<T>>)) -> Self {
        CallMethodRequest {
            object_id: v.0,
            method_id: v.1,
            input_arguments: v.2.map(|args| args.into_iter().map(|a| a.into()).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodResult {
    pub status_code: StatusCode,
    pub input_argument_results: Option<Vec<StatusCode>>,
    pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    pub output_arguments: Option<Vec<Variant>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub request_header: RequestHeader,
    pub methods_to_call: Option<Vec<CallMethodRequest>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<CallMethodResult>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}
