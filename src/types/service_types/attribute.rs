// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Attribute service set types: Read, Write and HistoryRead.

use crate::types::{
    data_value::{DataValue, DateTime},
    node_id::NodeId,
    service_types::{
        AttributeId, DiagnosticInfo, QualifiedName, RequestHeader, ResponseHeader,
        TimestampsToReturn,
    },
    status_code::StatusCode,
};

/// Identifies the node attribute to read or monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: Option<String>,
    pub data_encoding: QualifiedName,
}

impl From<NodeId> for ReadValueId {
    fn from(node_id: NodeId) -> Self {
        ReadValueId::new(node_id, AttributeId::Value)
    }
}

impl ReadValueId {
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> ReadValueId {
        ReadValueId {
            node_id,
            attribute_id: attribute_id as u32,
            index_range: None,
            data_encoding: QualifiedName::default(),
        }
    }

    /// The attribute as an enum, if it is a known one.
    pub fn attribute(&self) -> Option<AttributeId> {
        AttributeId::from_u32(self.attribute_id).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub request_header: RequestHeader,
    pub max_age: f64,
    pub timestamps_to_return: TimestampsToReturn,
    pub nodes_to_read: Option<Vec<ReadValueId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<DataValue>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: Option<String>,
    pub value: DataValue,
}

impl WriteValue {
    pub fn new(node_id: NodeId, attribute_id: AttributeId, value: DataValue) -> WriteValue {
        WriteValue {
            node_id,
            attribute_id: attribute_id as u32,
            index_range: None,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub request_header: RequestHeader,
    pub nodes_to_write: Option<Vec<WriteValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadValueId {
    pub node_id: NodeId,
    pub index_range: Option<String>,
    pub data_encoding: QualifiedName,
    pub continuation_point: Option<Vec<u8>>,
}

impl From<NodeId> for HistoryReadValueId {
    fn from(node_id: NodeId) -> Self {
        HistoryReadValueId {
            node_id,
            index_range: None,
            data_encoding: QualifiedName::default(),
            continuation_point: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRawModifiedDetails {
    pub is_read_modified: bool,
    pub start_time: DateTime,
    pub end_time: DateTime,
    pub num_values_per_node: u32,
    pub return_bounds: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadProcessedDetails {
    pub start_time: DateTime,
    pub end_time: DateTime,
    /// Processing interval in milliseconds.
    pub processing_interval: f64,
    pub aggregate_type: Option<Vec<NodeId>>,
}

/// The kind of history read to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryReadDetails {
    RawModified(ReadRawModifiedDetails),
    Processed(ReadProcessedDetails),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadRequest {
    pub request_header: RequestHeader,
    pub history_read_details: HistoryReadDetails,
    pub timestamps_to_return: TimestampsToReturn,
    pub release_continuation_points: bool,
    pub nodes_to_read: Option<Vec<HistoryReadValueId>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryData {
    pub data_values: Option<Vec<DataValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadResult {
    pub status_code: StatusCode,
    pub continuation_point: Option<Vec<u8>>,
    pub history_data: HistoryData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<HistoryReadResult>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}
