// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::atomic::{AtomicU32, Ordering};

/// Handle factory using atomics. Handles wrap back to `first` after `u32::MAX`, which makes it
/// suitable for request handles where only recent handles need to be distinct.
#[derive(Debug)]
pub struct AtomicHandle {
    next: AtomicU32,
    first: u32,
}

impl AtomicHandle {
    pub fn new(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
            first,
        }
    }

    pub fn next(&self) -> u32 {
        let mut val = self.next.fetch_add(1, Ordering::Acquire);

        while val < self.first {
            // On overflow, try to reset the next value to first + 1
            match self.next.compare_exchange(
                val + 1,
                self.first + 1,
                Ordering::Release,
                Ordering::SeqCst,
            ) {
                // If it succeeds, just use first directly.
                Ok(_) => val = self.first,
                Err(v) => {
                    if v >= self.first {
                        val = self.next.fetch_add(1, Ordering::Acquire);
                    } else {
                        val = v;
                    }
                }
            }
        }
        val
    }

    pub fn set_next(&self, next: u32) {
        debug_assert!(next >= self.first);
        self.next.store(next, Ordering::Relaxed);
    }

    /// Resets the handle to its initial state
    pub fn reset(&self) {
        self.set_next(self.first);
    }
}

/// Handle factory that never wraps. Every value it issues is strictly greater than the previous
/// one and once the range is exhausted it issues nothing.
#[derive(Debug)]
pub struct SequenceHandle {
    next: AtomicU32,
}

impl SequenceHandle {
    pub fn new(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Returns the next handle, or `None` once `u32::MAX` has been issued.
    pub fn next(&self) -> Option<u32> {
        // u32::MAX is used as the exhausted marker, so it is never issued
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(1))
            .ok()
    }

    /// Peek at the value the next call will issue.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }
}

#[test]
fn atomic_handle_increment() {
    // Expect sequential handles
    let h = AtomicHandle::new(0);
    assert_eq!(h.next(), 0);
    assert_eq!(h.next(), 1);
    assert_eq!(h.next(), 2);
    let h = AtomicHandle::new(100);
    assert_eq!(h.next(), 100);
    assert_eq!(h.next(), 101);
}

#[test]
fn atomic_handle_wrap() {
    // Simulate wrapping around
    let h = AtomicHandle::new(u32::MAX - 2);
    assert_eq!(h.next(), u32::MAX - 2);
    assert_eq!(h.next(), u32::MAX - 1);
    assert_eq!(h.next(), u32::MAX);
    assert_eq!(h.next(), u32::MAX - 2);
}

#[test]
fn sequence_handle_never_wraps() {
    let h = SequenceHandle::new(u32::MAX - 2);
    assert_eq!(h.next(), Some(u32::MAX - 2));
    assert_eq!(h.next(), Some(u32::MAX - 1));
    assert_eq!(h.next(), None);
    assert_eq!(h.next(), None);
    assert_eq!(h.peek(), u32::MAX);
}

#[test]
fn sequence_handle_concurrent_unique() {
    use std::{collections::HashSet, sync::Arc};

    let h = Arc::new(SequenceHandle::new(1));
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            std::thread::spawn(move || (0..250).filter_map(|_| h.next()).collect::<Vec<_>>())
        })
        .collect();
    let all: Vec<u32> = threads
        .into_iter()
        .flat_map(|t| t.join().unwrap())
        .collect();
    let unique: HashSet<u32> = all.iter().cloned().collect();
    assert_eq!(all.len(), 1000);
    assert_eq!(unique.len(), 1000);
    assert_eq!(h.peek(), 1001);
}
