//! Request generator feeding the shared queue
//!
//! The source is deliberately tuned to produce slightly more than the
//! channels can send, so backlog handling and TTL expiry are always
//! exercised.

use crate::queue::SharedQueue;
use crate::shutdown::Shutdown;
use crate::types::Request;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Default over-subscription factor relative to total capacity
pub const DEFAULT_ARRIVAL_FACTOR: f64 = 1.05;

/// How long the source pauses between two requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalPattern {
    /// Uniformly random pause in `[0, max_delay]`
    Uniform { max_delay: Duration },
    /// Constant pause
    Fixed { interval: Duration },
}

impl ArrivalPattern {
    /// Pattern whose mean rate is `factor × channels × per_second_rate` per second
    ///
    /// With `jitter` the pause is uniform over twice the mean interval, which
    /// keeps the mean while varying individual arrivals.
    pub fn for_capacity(channels: usize, per_second_rate: usize, factor: f64, jitter: bool) -> Self {
        let target_rate = factor * (channels * per_second_rate) as f64;
        let mean = if target_rate > 0.0 {
            Duration::from_secs_f64(1.0 / target_rate)
        } else {
            Duration::from_secs(1)
        };

        if jitter {
            ArrivalPattern::Uniform {
                max_delay: mean * 2,
            }
        } else {
            ArrivalPattern::Fixed { interval: mean }
        }
    }

    /// Expected pause between two requests
    pub fn mean_delay(&self) -> Duration {
        match *self {
            ArrivalPattern::Uniform { max_delay } => max_delay / 2,
            ArrivalPattern::Fixed { interval } => interval,
        }
    }
}

/// Produces requests with increasing ids into a [`SharedQueue`]
pub struct RequestSource {
    queue: SharedQueue<Request>,
    pattern: ArrivalPattern,
    next_id: u64,
    rng: StdRng,
}

impl RequestSource {
    pub fn new(queue: SharedQueue<Request>, pattern: ArrivalPattern) -> Self {
        Self {
            queue,
            pattern,
            next_id: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for reproducible delays
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Push one new request and return it
    pub fn produce(&mut self) -> Request {
        let request = Request::new(self.next_id);
        self.next_id += 1;
        self.queue.push(request);
        request
    }

    /// Pick the pause before the next request
    pub fn next_delay(&mut self) -> Duration {
        match self.pattern {
            ArrivalPattern::Fixed { interval } => interval,
            ArrivalPattern::Uniform { max_delay } => {
                let max = max_delay.as_micros() as u64;
                Duration::from_micros(self.rng.gen_range(0..=max))
            }
        }
    }

    /// Produce requests until shutdown
    ///
    /// Returns the number of requests produced.
    pub async fn run(mut self, mut shutdown: Shutdown) -> u64 {
        tracing::debug!("Request source started with {:?}", self.pattern);

        loop {
            self.produce();
            let delay = self.next_delay();

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.next_id
    }
}
