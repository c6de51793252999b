// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Weak;

use tokio::time::MissedTickBehavior;

use crate::{
    client::{
        session::{session_debug, session_warn, Session, SessionEvent},
        Error,
    },
    types::{NodeId, ReadValueId, ServerState, StatusCode, TimestampsToReturn, VariableId},
};

impl Session {
    /// Starts reading the server state periodically so the server keeps the session alive while
    /// the client has nothing else to say. Every read emits a keep-alive event.
    pub(crate) fn start_keep_alive(&self) {
        let mut keep_alive = trace_lock!(self.keep_alive);
        if keep_alive.is_some() {
            return;
        }
        session_debug!(
            self,
            "session keep-alive every {}ms",
            self.keep_alive_interval.as_millis()
        );
        *keep_alive = Some(tokio::spawn(run_keep_alive(
            self.this.clone(),
            self.keep_alive_interval,
        )));
    }

    pub(crate) fn stop_keep_alive(&self) {
        if let Some(keep_alive) = trace_lock!(self.keep_alive).take() {
            keep_alive.abort();
        }
    }

    async fn read_server_state(&self) -> Result<(ServerState, crate::types::DateTime), Error> {
        let value = self
            .read_one(
                ReadValueId::from(NodeId::from(VariableId::Server_ServerStatus_State)),
                TimestampsToReturn::Server,
                0.0,
            )
            .await?;
        if !value.is_valid() {
            return Err(Error::Status(value.status()));
        }
        let state = value
            .value
            .as_ref()
            .and_then(|v| v.as_i32())
            .map(ServerState::from)
            .ok_or(Error::Status(StatusCode::BadDataTypeIdUnknown))?;
        let current_time = value.server_timestamp.unwrap_or_else(chrono::Utc::now);
        Ok((state, current_time))
    }
}

async fn run_keep_alive(session: Weak<Session>, interval: std::time::Duration) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    timer.tick().await;
    loop {
        timer.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if session.is_closed() {
            break;
        }
        if session.is_reconnecting() || !session.is_channel_valid() {
            continue;
        }
        match session.read_server_state().await {
            Ok((state, current_time)) => {
                if state != ServerState::Running {
                    session_warn!(session, "keep-alive, server state is {:?}", state);
                }
                session.emit(SessionEvent::KeepAlive {
                    state,
                    current_time,
                });
            }
            Err(err) => {
                session_warn!(session, "keep-alive read failed, {}", err);
                session.emit(SessionEvent::KeepAliveFailure(err.status()));
            }
        }
    }
}
