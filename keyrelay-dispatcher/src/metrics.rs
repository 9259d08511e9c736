//! Dispatch counters
//!
//! Lightweight atomic counters shared by every channel. Two kinds are kept:
//!
//! - per-interval counters (`sent`, `dequeued`) that the throughput
//!   accountant reads and zeroes once per reporting interval
//! - lifetime totals used for the run summary
//!
//! Recording never blocks and never allocates.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected while the pipeline runs
pub struct Metrics {
    /// Sent since the last sample
    sent: AtomicU64,
    /// Dequeued since the last sample
    dequeued: AtomicU64,

    total_sent: AtomicU64,
    total_dequeued: AtomicU64,
    dropped_queue: AtomicU64,
    dropped_limiter: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Per-interval counts taken by [`Metrics::take_sample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThroughputSample {
    pub sent: u64,
    pub dequeued: u64,
}

/// Lifetime counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    /// Calls answered by the remote, whatever the payload
    pub sent: u64,
    pub dequeued: u64,
    pub dropped_queue: u64,
    pub dropped_limiter: u64,
    /// Calls answered with a non-success payload
    pub rejected: u64,
    /// Calls that timed out or failed in the transport
    pub failed: u64,
}

impl Totals {
    pub fn dropped(&self) -> u64 {
        self.dropped_queue + self.dropped_limiter
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_dequeued: AtomicU64::new(0),
            dropped_queue: AtomicU64::new(0),
            dropped_limiter: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Record a request taken off the shared queue
    pub fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.total_dequeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a call the remote answered
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.total_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_queue(&self) {
        self.dropped_queue.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_limiter(&self) {
        self.dropped_limiter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and zero the per-interval counters
    ///
    /// Each counter is swapped atomically, so no increment is lost or counted
    /// twice across samples.
    pub fn take_sample(&self) -> ThroughputSample {
        ThroughputSample {
            sent: self.sent.swap(0, Ordering::Relaxed),
            dequeued: self.dequeued.swap(0, Ordering::Relaxed),
        }
    }

    pub fn totals(&self) -> Totals {
        Totals {
            sent: self.total_sent.load(Ordering::Relaxed),
            dequeued: self.total_dequeued.load(Ordering::Relaxed),
            dropped_queue: self.dropped_queue.load(Ordering::Relaxed),
            dropped_limiter: self.dropped_limiter.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
