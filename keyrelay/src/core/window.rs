//! Fixed-size ring of admission timestamps
//!
//! A window of capacity `R` remembers the last `R` admissions. The slot under
//! the cursor always holds the oldest of them, so "at most `R` admissions in
//! any trailing window" reduces to a single comparison against that slot.

use super::AdmissionError;
use std::time::{Duration, Instant};

/// Ring buffer backing the sliding-window rule
///
/// Slots start out empty. An empty slot has never been used and never blocks
/// an admission.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    slots: Box<[Option<Instant>]>,
    cursor: usize,
    length: Duration,
}

impl SlidingWindow {
    /// Creates a window holding `capacity` slots over `length`
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidRate`]: If `capacity` is zero
    /// - [`AdmissionError::InvalidWindow`]: If `length` is zero
    pub fn new(capacity: usize, length: Duration) -> Result<Self, AdmissionError> {
        if capacity == 0 {
            return Err(AdmissionError::InvalidRate);
        }
        if length.is_zero() {
            return Err(AdmissionError::InvalidWindow);
        }
        Ok(SlidingWindow {
            slots: vec![None; capacity].into_boxed_slice(),
            cursor: 0,
            length,
        })
    }

    /// Number of slots, i.e. the admission cap per window
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Length of the trailing window
    pub fn length(&self) -> Duration {
        self.length
    }

    /// Index of the slot the next admission will reuse
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Timestamp currently stored in the slot under the cursor
    pub fn oldest(&self) -> Option<Instant> {
        self.slots[self.cursor]
    }

    /// Time left until the slot under the cursor may be reused
    ///
    /// Returns `None` when the slot is free at `now`. Reuse requires the prior
    /// occupant to be strictly older than the window length.
    pub fn wait_at(&self, now: Instant) -> Option<Duration> {
        let occupied_at = self.oldest()?;
        wait_past(occupied_at + self.length, now)
    }

    /// Stores `now` in the slot under the cursor and advances the cursor
    pub fn record(&mut self, now: Instant) {
        self.slots[self.cursor] = Some(now);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Counts admissions no older than the window length at `now`
    pub fn count_within(&self, now: Instant) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|at| now.saturating_duration_since(**at) <= self.length)
            .count()
    }
}

/// Time left until `now` is strictly past `deadline`, or `None` once it is.
pub(crate) fn wait_past(deadline: Instant, now: Instant) -> Option<Duration> {
    if now > deadline {
        None
    } else {
        Some(deadline.saturating_duration_since(now) + Duration::from_nanos(1))
    }
}
