// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Estimates the offset between the client clock and the server clock from the timestamps of
//! responses, so request headers can be stamped with server time.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::{sync::Mutex, types::DateTime};

const MAX_SAMPLES: usize = 64;

#[derive(Debug)]
pub struct ClockAdjustment {
    enabled: AtomicBool,
    /// Offset in milliseconds to add to the client clock to obtain server time.
    offset_ms: AtomicI64,
    samples: Mutex<Vec<i64>>,
}

impl ClockAdjustment {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            offset_ms: AtomicI64::new(0),
            samples: Mutex::new(Vec::with_capacity(MAX_SAMPLES)),
        }
    }

    /// Records the offset observed by one transaction. The server is assumed to have stamped the
    /// response half way between the request being sent and the response arriving.
    pub fn record(&self, sent: DateTime, received: DateTime, server_timestamp: DateTime) {
        if !self.enabled.load(Ordering::Relaxed) || received < sent {
            return;
        }
        let midpoint = sent + (received - sent) / 2;
        let offset = (server_timestamp - midpoint).num_milliseconds();
        let mut samples = trace_lock!(self.samples);
        if samples.len() == MAX_SAMPLES {
            samples.remove(0);
        }
        samples.push(offset);
    }

    /// Folds the samples collected since the last call into the current offset.
    pub fn adjust(&self) {
        let mut samples = trace_lock!(self.samples);
        if samples.is_empty() {
            return;
        }
        let offset = samples.iter().sum::<i64>() / samples.len() as i64;
        samples.clear();
        let previous = self.offset_ms.swap(offset, Ordering::Relaxed);
        if previous != offset {
            debug!("Clock offset to the server is now {}ms", offset);
        }
    }

    pub fn offset(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.offset_ms.load(Ordering::Relaxed))
    }

    /// The current time according to the server clock.
    pub fn adjusted_now(&self) -> DateTime {
        chrono::Utc::now() + self.offset()
    }

    pub fn reset(&self) {
        self.offset_ms.store(0, Ordering::Relaxed);
        trace_lock!(self.samples).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_from_samples() {
        let clock = ClockAdjustment::new(true);
        let sent = chrono::Utc::now();
        let received = sent + chrono::Duration::milliseconds(100);
        clock.record(sent, received, sent + chrono::Duration::milliseconds(1050));
        clock.record(sent, received, sent + chrono::Duration::milliseconds(1150));
        assert_eq!(clock.offset(), chrono::Duration::zero());
        clock.adjust();
        assert_eq!(clock.offset(), chrono::Duration::milliseconds(1050));
        assert!(clock.adjusted_now() > chrono::Utc::now());
        clock.reset();
        assert_eq!(clock.offset(), chrono::Duration::zero());
    }

    #[test]
    fn disabled_ignores_samples() {
        let clock = ClockAdjustment::new(false);
        let now = chrono::Utc::now();
        clock.record(now, now, now + chrono::Duration::seconds(10));
        clock.adjust();
        assert_eq!(clock.offset(), chrono::Duration::zero());
    }
}
