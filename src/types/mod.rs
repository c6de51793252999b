// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The subset of the OPC UA data model the client runtime consumes.

pub mod data_value;
pub mod extension_object;
pub mod node_id;
pub mod notification_message;
pub mod service_types;
pub mod status_code;

pub use self::{
    data_value::{DataValue, DateTime, Variant},
    extension_object::{ExtensionObject, ExtensionObjectEncoding},
    node_id::{Identifier, NodeId, ObjectId, VariableId},
    notification_message::*,
    service_types::*,
    status_code::StatusCode,
};
