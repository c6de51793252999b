// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::{atomic::Ordering, Arc};

use crate::{
    client::{
        session::{session_debug, session_warn, Session},
        Error, MonitoredItem,
    },
    types::TimestampsToReturn,
};

use super::{Subscription, SubscriptionEvent, SubscriptionState};

impl Subscription {
    /// Creates the subscription and its monitored items again on a session the server no longer
    /// associates with them. Items keep their client handles and receive new server ids.
    /// Triggering links are re-applied with the new ids.
    ///
    /// A subscription the server refuses to create again is terminated.
    pub async fn recreate_subscription_and_monitored_items(&self) -> Result<(), Error> {
        let old_id = self.id_or_err()?;
        let session = self.session()?;
        if let Some(engine) = self.publish_engine.upgrade() {
            engine.unregister_subscription(old_id);
        }

        let parameters = self.parameters();
        let response = match session.create_subscription(&parameters).await {
            Ok(response) => response,
            Err(err) => {
                session_warn!(
                    session,
                    "subscription {} could not be recreated, {}",
                    old_id,
                    err
                );
                self.terminate_locally(err.status());
                return Err(err);
            }
        };
        self.apply_revised(&response);
        let new_id = response.subscription_id;
        let updated = self.state.send_if_modified(|state| {
            if matches!(state, SubscriptionState::Active(_)) {
                *state = SubscriptionState::Active(new_id);
                true
            } else {
                false
            }
        });
        if !updated {
            // Terminated while the server was creating it
            let _ = session.delete_subscriptions(&[new_id]).await;
            return Err(Error::InvalidState(
                "subscription was terminated during its recreation".to_string(),
            ));
        }
        session_debug!(
            session,
            "subscription {} was recreated as {}",
            old_id,
            new_id
        );
        self.last_sequence_number.store(0, Ordering::Release);
        trace_lock!(self.missing).clear();

        let items = self.monitored_items();
        let mut batches: Vec<(TimestampsToReturn, Vec<Arc<MonitoredItem>>)> = Vec::new();
        for item in items {
            item.reset_for_recreate();
            let timestamps_to_return = item.timestamps_to_return();
            match batches.iter_mut().find(|(t, _)| *t == timestamps_to_return) {
                Some((_, batch)) => batch.push(item),
                None => batches.push((timestamps_to_return, vec![item])),
            }
        }
        for (timestamps_to_return, batch) in batches {
            if let Err(err) = self
                .create_items(new_id, &batch, timestamps_to_return)
                .await
            {
                session_warn!(
                    session,
                    "monitored items of subscription {} could not be recreated, {}",
                    new_id,
                    err
                );
            }
        }
        self.restore_triggering(&session, new_id).await;

        if let (Some(engine), Some(this)) = (self.publish_engine.upgrade(), self.this.upgrade()) {
            engine.register_subscription(new_id, this);
        }
        self.emit(SubscriptionEvent::Started(new_id));
        Ok(())
    }

    async fn restore_triggering(&self, session: &Session, subscription_id: u32) {
        for item in self.monitored_items() {
            let triggering_item_id = item.monitored_item_id();
            let triggered = item.triggered_items();
            if triggering_item_id == 0 || triggered.is_empty() {
                continue;
            }
            let links: Vec<u32> = triggered
                .iter()
                .filter_map(|client_handle| self.monitored_item(*client_handle))
                .map(|i| i.monitored_item_id())
                .filter(|id| *id != 0)
                .collect();
            if links.is_empty() {
                continue;
            }
            if let Err(err) = session
                .set_triggering(subscription_id, triggering_item_id, &links, &[])
                .await
            {
                session_warn!(
                    session,
                    "triggering of monitored item {} could not be restored, {}",
                    triggering_item_id,
                    err
                );
            }
        }
    }
}
