// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA services exposed by a session, grouped by service set.

pub mod attributes;
mod method;
mod session;
mod subscriptions;
mod view;
