// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Helpers for the communication layer that the client needs above the transport.

pub mod url;

pub mod prelude {
    pub use super::url::*;
}
