//! Async admission on top of the core sliding-window limiter
//!
//! [`ChannelLimiter`] polls [`keyrelay::RateLimiter`] on a fixed interval,
//! yielding to the runtime between checks, until the request is admitted or
//! its timeout runs out.

use crate::error::DispatchError;
use keyrelay::RateLimiter;
use std::time::Duration;
use tokio::time::Instant;

/// Default pause between two admission checks
///
/// Shorter intervals admit closer to the exact instant a rule clears at the
/// cost of more wakeups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Proof that one request was admitted
///
/// Holding an `Admission` entitles the caller to send exactly one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted_at: Instant,
    pub waited: Duration,
}

/// Rate limiter owned by a single channel's worker
pub struct ChannelLimiter {
    limiter: RateLimiter,
    poll_interval: Duration,
}

impl ChannelLimiter {
    pub fn new(limiter: RateLimiter) -> Self {
        ChannelLimiter {
            limiter,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn inner(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Wait until the limiter admits one request
    ///
    /// A `timeout` of zero waits indefinitely. The timeout is checked before
    /// every admission attempt, so an expired call never records an admission.
    ///
    /// # Errors
    ///
    /// [`DispatchError::LimiterTimeout`] once more than `timeout` has passed
    /// since the call started.
    pub async fn acquire(&mut self, timeout: Duration) -> Result<Admission, DispatchError> {
        let start = Instant::now();

        loop {
            let now = Instant::now();
            let waited = now.saturating_duration_since(start);

            if !timeout.is_zero() && waited > timeout {
                return Err(DispatchError::LimiterTimeout { waited });
            }

            if self.limiter.try_admit(now.into_std()).is_admit() {
                return Ok(Admission {
                    admitted_at: now,
                    waited,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
