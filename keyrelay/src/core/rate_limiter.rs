//! Sliding-window admission gate with a minimum spacing rule
//!
//! This module provides the main [`RateLimiter`] struct. One instance guards
//! one channel (one API credential) and is owned by exactly one caller, so it
//! takes `&mut self` and needs no locking.

use super::window::{SlidingWindow, wait_past};
use super::{AdmissionError, Rate};
use std::time::{Duration, Instant};

/// Length of the trailing window the per-second cap applies to
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Both rules hold; exactly one request may be sent
    Admit,
    /// At least one rule is violated. The payload is the shortest wait after
    /// which both rules would hold, assuming no other admission happens.
    Wait(Duration),
}

impl Decision {
    /// Returns true for [`Decision::Admit`]
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    /// Returns the suggested wait, or zero for an admission
    pub fn retry_after(&self) -> Duration {
        match self {
            Decision::Admit => Duration::ZERO,
            Decision::Wait(wait) => *wait,
        }
    }
}

/// Per-channel admission gate
///
/// A request is admitted at `now` only when both rules hold:
///
/// - **spacing**: `now - last_admit > min_spacing`
/// - **sliding window**: `now - slots[cursor] > window`, i.e. the slot about to
///   be reused holds an admission older than the window
///
/// On admission `last_admit` and `slots[cursor]` are set to `now` and the
/// cursor advances modulo the per-second rate. A refused check mutates nothing.
///
/// The caller supplies `now`, which keeps the rule deterministic and lets the
/// async layer drive it from a mockable clock.
///
/// # Example
///
/// ```
/// use keyrelay::{Decision, RateLimiter};
/// use std::time::{Duration, Instant};
///
/// // 20 requests per second, at least 50ms apart
/// let mut limiter = RateLimiter::new(20, Duration::from_millis(50)).unwrap();
///
/// let t0 = Instant::now();
/// assert_eq!(limiter.try_admit(t0), Decision::Admit);
///
/// // Too soon after the first admission
/// assert!(!limiter.try_admit(t0 + Duration::from_millis(30)).is_admit());
/// assert!(limiter.try_admit(t0 + Duration::from_millis(51)).is_admit());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_spacing: Duration,
    window: SlidingWindow,
    last_admit: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter with the default one-second window
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidRate`]: If `per_second_rate` is zero
    pub fn new(per_second_rate: usize, min_spacing: Duration) -> Result<Self, AdmissionError> {
        Self::builder()
            .per_second(per_second_rate)
            .min_spacing(min_spacing)
            .build()
    }

    /// Create a builder for a custom limiter
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::default()
    }

    /// Check whether a request could be admitted at `now` without recording it
    pub fn check(&self, now: Instant) -> Decision {
        let spacing_wait = match self.last_admit {
            Some(last) if !self.min_spacing.is_zero() => wait_past(last + self.min_spacing, now),
            _ => None,
        };
        let window_wait = self.window.wait_at(now);

        match (spacing_wait, window_wait) {
            (None, None) => Decision::Admit,
            (a, b) => Decision::Wait(a.unwrap_or_default().max(b.unwrap_or_default())),
        }
    }

    /// Admit a request at `now` if both rules hold
    ///
    /// Returns [`Decision::Admit`] after recording the admission, or
    /// [`Decision::Wait`] with the state left untouched.
    pub fn try_admit(&mut self, now: Instant) -> Decision {
        let decision = self.check(now);
        if decision.is_admit() {
            self.last_admit = Some(now);
            self.window.record(now);
        }
        decision
    }

    /// The cap on admissions within any trailing window
    pub fn per_second_rate(&self) -> usize {
        self.window.capacity()
    }

    /// Minimum spacing between consecutive admissions
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Length of the sliding window
    pub fn window(&self) -> Duration {
        self.window.length()
    }

    /// Timestamp of the most recent admission
    pub fn last_admit(&self) -> Option<Instant> {
        self.last_admit
    }

    /// Index of the window slot the next admission will use
    pub fn cursor(&self) -> usize {
        self.window.cursor()
    }

    /// Number of admissions whose age at `now` is within the window
    pub fn admissions_in_window(&self, now: Instant) -> usize {
        self.window.count_within(now)
    }
}

/// Builder for [`RateLimiter`]
///
/// The minimum spacing defaults to the nominal spacing of the per-second
/// rate (`1s / rate`); pass `Duration::ZERO` to disable the spacing rule.
///
/// # Example
///
/// ```
/// use keyrelay::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::builder()
///     .per_second(20)
///     .window(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert_eq!(limiter.min_spacing(), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterBuilder {
    per_second: usize,
    min_spacing: Option<Duration>,
    window: Duration,
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self {
            per_second: 0,
            min_spacing: None,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimiterBuilder {
    /// Set the cap on admissions per window
    pub fn per_second(mut self, rate: usize) -> Self {
        self.per_second = rate;
        self
    }

    /// Set the minimum spacing between consecutive admissions
    pub fn min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = Some(spacing);
        self
    }

    /// Set the sliding window length
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Build the limiter
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidRate`]: If the per-second rate is zero
    /// - [`AdmissionError::InvalidWindow`]: If the window length is zero
    pub fn build(self) -> Result<RateLimiter, AdmissionError> {
        let window = SlidingWindow::new(self.per_second, self.window)?;
        let rate = u32::try_from(self.per_second).unwrap_or(u32::MAX);
        let min_spacing = self
            .min_spacing
            .unwrap_or_else(|| Rate::per_period(rate, self.window).spacing());

        Ok(RateLimiter {
            min_spacing,
            window,
            last_admit: None,
        })
    }
}
