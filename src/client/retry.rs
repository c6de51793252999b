// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::time::Duration;

use rand::Rng;

/// Iterator of delays between attempts to open a channel. Each delay doubles the previous one up
/// to `max_sleep`, with an optional random spread of `randomisation_factor` either side.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_sleep: Duration,
    max_retries: Option<u32>,
    current_sleep: Duration,
    retry_count: u32,
    randomisation_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(
        max_sleep: Duration,
        max_retries: Option<u32>,
        initial_sleep: Duration,
        randomisation_factor: f64,
    ) -> Self {
        Self {
            max_sleep,
            max_retries,
            current_sleep: initial_sleep,
            retry_count: 0,
            randomisation_factor: randomisation_factor.clamp(0.0, 1.0),
        }
    }

    /// Number of delays handed out so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn jitter(&self, sleep: Duration) -> Duration {
        if self.randomisation_factor == 0.0 {
            return sleep;
        }
        let spread = rand::rng().random_range(-self.randomisation_factor..=self.randomisation_factor);
        sleep.mul_f64(1.0 + spread).min(self.max_sleep)
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_retries.is_some_and(|max| max <= self.retry_count) {
            return None;
        }

        let next_sleep = self.jitter(self.current_sleep);
        self.current_sleep = self.max_sleep.min(self.current_sleep * 2);
        self.retry_count += 1;

        Some(next_sleep)
    }
}

/// Backoff parameters used when opening a channel to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStrategy {
    /// Delay before the first retry in milliseconds.
    pub initial_delay: u64,
    /// Upper bound of any delay in milliseconds.
    pub max_delay: u64,
    /// Number of retries, -1 for infinite and 0 for none.
    pub max_retry: i32,
    /// Random spread applied to each delay, between 0 and 1.
    pub randomisation_factor: f64,
}

impl Default for ConnectionStrategy {
    fn default() -> Self {
        Self {
            initial_delay: Self::DEFAULT_INITIAL_DELAY_MS,
            max_delay: Self::DEFAULT_MAX_DELAY_MS,
            max_retry: Self::DEFAULT_RETRY_LIMIT,
            randomisation_factor: Self::DEFAULT_RANDOMISATION_FACTOR,
        }
    }
}

impl ConnectionStrategy {
    pub const DEFAULT_RETRY_LIMIT: i32 = 10;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30000;
    pub const DEFAULT_RANDOMISATION_FACTOR: f64 = 0.1;

    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        max_retry: i32,
        randomisation_factor: f64,
    ) -> Self {
        Self {
            initial_delay: initial_delay.as_millis() as u64,
            max_delay: max_delay.as_millis() as u64,
            max_retry,
            randomisation_factor,
        }
    }

    /// The same delays, retried forever.
    pub fn infinite(&self) -> Self {
        Self {
            max_retry: -1,
            ..self.clone()
        }
    }

    /// A strategy that gives up after the first failure.
    pub fn never() -> Self {
        Self {
            max_retry: 0,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.max_retry < -1 {
            error!(
                "Connection retry limit of {} is invalid - must be -1 (infinite), 0 (never) or a positive value",
                self.max_retry
            );
            valid = false;
        }
        if !(0.0..1.0).contains(&self.randomisation_factor) {
            error!(
                "Randomisation factor {} must be at least 0 and less than 1",
                self.randomisation_factor
            );
            valid = false;
        }
        if self.initial_delay > self.max_delay {
            error!(
                "Initial delay {}ms exceeds the max delay {}ms",
                self.initial_delay, self.max_delay
            );
            valid = false;
        }
        valid
    }

    pub(crate) fn new_backoff(&self) -> ExponentialBackoff {
        let max_retries = if self.max_retry < 0 {
            None
        } else {
            Some(self.max_retry as u32)
        };
        ExponentialBackoff::new(
            Duration::from_millis(self.max_delay),
            max_retries,
            Duration::from_millis(self.initial_delay),
            self.randomisation_factor,
        )
    }
}
