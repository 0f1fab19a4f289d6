// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window counters for rate and spend accounting.
//!
//! Windows are maintained by timestamped entries pruned lazily on each
//! access, not by fixed-bucket resets, so a burst straddling a bucket
//! boundary cannot slip through at double the configured rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A sliding window counting timestamped events.
#[derive(Debug)]
pub struct SlidingWindow {
    window: Duration,
    entries: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    /// Record an event at `now`.
    pub fn record(&mut self, now: Instant) {
        self.entries.push_back(now);
    }

    /// Events currently inside the window, pruning expired entries.
    pub fn count(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.entries.len()
    }

    /// Time until the oldest in-window entry expires and frees a slot.
    ///
    /// Zero when the window is empty.
    pub fn retry_after(&mut self, now: Instant) -> Duration {
        self.prune(now);
        match self.entries.front() {
            Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
            None => Duration::ZERO,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.front() {
            if now.duration_since(*oldest) >= self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}

/// One spend record inside a [`SpendWindow`].
#[derive(Debug)]
struct SpendEntry {
    at: Instant,
    amount: f64,
    id: u64,
}

/// A sliding window summing timestamped spend amounts.
///
/// Entries carry ids so an optimistic estimate can later be replaced with
/// the measured cost (commit) or removed entirely (release) without
/// disturbing other in-flight reservations.
#[derive(Debug)]
pub struct SpendWindow {
    window: Duration,
    entries: VecDeque<SpendEntry>,
    next_id: u64,
}

impl SpendWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Record a spend amount at `now`, returning its entry id.
    pub fn record(&mut self, now: Instant, amount: f64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(SpendEntry { at: now, amount, id });
        id
    }

    /// Replace the amount of entry `id`, if it is still inside the window.
    pub fn adjust(&mut self, id: u64, amount: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.amount = amount;
        }
    }

    /// Remove entry `id`, if it is still inside the window.
    pub fn remove(&mut self, id: u64) {
        self.entries.retain(|e| e.id != id);
    }

    /// Total spend inside the window, pruning expired entries.
    pub fn total(&mut self, now: Instant) -> f64 {
        self.prune(now);
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Time until the oldest in-window entry expires.
    pub fn time_until_oldest_expires(&mut self, now: Instant) -> Duration {
        self.prune(now);
        match self.entries.front() {
            Some(oldest) => self.window.saturating_sub(now.duration_since(oldest.at)),
            None => Duration::ZERO,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.front() {
            if now.duration_since(oldest.at) >= self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
