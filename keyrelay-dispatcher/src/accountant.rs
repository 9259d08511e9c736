//! Once-per-interval throughput reporting

use crate::metrics::{Metrics, ThroughputSample};
use crate::queue::SharedQueue;
use crate::shutdown::Shutdown;
use crate::types::Request;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Time between two throughput lines
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Samples and resets the interval counters, logging one line per tick
pub struct ThroughputAccountant {
    metrics: Arc<Metrics>,
    queue: SharedQueue<Request>,
}

impl ThroughputAccountant {
    pub fn new(metrics: Arc<Metrics>, queue: SharedQueue<Request>) -> Self {
        Self { metrics, queue }
    }

    /// Take one sample and log it
    pub fn report(&self) -> ThroughputSample {
        let sample = self.metrics.take_sample();
        tracing::info!(
            "Throughput: {} requests made / second, {} dequeued, {} queued",
            sample.sent,
            sample.dequeued,
            self.queue.len()
        );
        sample
    }

    /// Report every interval until shutdown
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }
}
