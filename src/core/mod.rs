// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Functionality shared by the client modules: the message enumeration passed to and from the
//! transport, handle factories, configuration persistence and url helpers.

pub mod comms;
pub mod config;
pub mod handle;
pub mod supported_message;

pub mod prelude {
    pub use crate::core::{
        comms::prelude::*, config::*, handle::*, supported_message::SupportedMessage,
    };
    pub use crate::types::*;
}
