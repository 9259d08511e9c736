//! Nominal request spacing for a per-second rate cap
//!
//! This module provides the [`Rate`] type which converts a human-friendly
//! rate specification (e.g., "20 requests per second") into the spacing a
//! channel should keep between consecutive requests.

use std::time::Duration;

#[cfg(test)]
mod tests;

/// Rate defines the nominal spacing between two admissions
///
/// The sliding window alone allows a channel to spend its whole per-second
/// budget in a single burst. The spacing derived from a `Rate` spreads the
/// same budget evenly across the second.
///
/// # Examples
///
/// ```
/// use keyrelay::Rate;
/// use std::time::Duration;
///
/// // 20 requests per second
/// let rate = Rate::per_second(20);
/// assert_eq!(rate.spacing(), Duration::from_millis(50));
///
/// // Custom spacing: 1 request every 2.5 seconds
/// let rate = Rate::new(Duration::from_millis(2500));
/// assert_eq!(rate.spacing(), Duration::from_millis(2500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    spacing: Duration,
}

impl Rate {
    /// Creates a new rate with a custom spacing between admissions
    pub fn new(spacing: Duration) -> Self {
        Rate { spacing }
    }

    /// Creates a rate of n requests per second
    ///
    /// A rate of zero yields a zero spacing; the limiter builder rejects a
    /// zero per-second rate on its own.
    ///
    /// # Example
    ///
    /// ```
    /// use keyrelay::Rate;
    /// use std::time::Duration;
    ///
    /// let rate = Rate::per_second(100);
    /// assert_eq!(rate.spacing(), Duration::from_millis(10));
    /// ```
    pub fn per_second(n: u32) -> Self {
        Self::per_period(n, Duration::from_secs(1))
    }

    /// Creates a rate of n requests per minute
    pub fn per_minute(n: u32) -> Self {
        Self::per_period(n, Duration::from_secs(60))
    }

    /// Creates a rate of `count` requests spread across `period`
    ///
    /// # Example
    ///
    /// ```
    /// use keyrelay::Rate;
    /// use std::time::Duration;
    ///
    /// // 5 channels sharing a 20/s budget each: 100 requests per second overall
    /// let rate = Rate::per_period(100, Duration::from_secs(1));
    /// assert_eq!(rate.spacing(), Duration::from_millis(10));
    /// ```
    pub fn per_period(count: u32, period: Duration) -> Self {
        if count == 0 {
            return Rate {
                spacing: Duration::ZERO,
            };
        }

        Rate {
            spacing: period / count,
        }
    }

    /// Returns the spacing between two consecutive admissions
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Returns how many admissions fit in one second at this spacing
    ///
    /// Returns `None` for a zero spacing, which places no bound on the rate.
    pub fn per_second_capacity(&self) -> Option<f64> {
        if self.spacing.is_zero() {
            None
        } else {
            Some(1.0 / self.spacing.as_secs_f64())
        }
    }
}
