// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Process wide registry of connected clients, keyed by their process-local id.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Weak,
    },
};

use crate::{client::connection::ClientConnection, sync::Mutex};

lazy_static! {
    static ref NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);
    static ref CONNECTIONS: Mutex<HashMap<u32, Weak<ClientConnection>>> =
        Mutex::new(HashMap::new());
}

pub(super) fn next_connection_id() -> u32 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

pub(super) fn register(id: u32, connection: Weak<ClientConnection>) {
    trace_lock!(CONNECTIONS).insert(id, connection);
}

pub(super) fn unregister(id: u32) {
    trace_lock!(CONNECTIONS).remove(&id);
}

pub(super) fn is_registered(id: u32) -> bool {
    trace_lock!(CONNECTIONS).contains_key(&id)
}

/// Connections that are currently connected, in no particular order.
pub fn connected_clients() -> Vec<Arc<ClientConnection>> {
    let mut connections = trace_lock!(CONNECTIONS);
    connections.retain(|_, c| c.strong_count() > 0);
    connections.values().filter_map(|c| c.upgrade()).collect()
}
