//! Core components of the keyrelay admission library
//!
//! This module contains the fundamental building blocks:
//! - [`rate`]: Conversion from a per-second cap to a nominal spacing
//! - [`rate_limiter`]: The sliding-window + spacing admission gate
//! - [`window`]: The fixed-size ring of admission timestamps

pub mod rate;
pub mod rate_limiter;
pub mod window;
#[cfg(test)]
mod tests;

pub use rate::Rate;
pub use rate_limiter::{DEFAULT_WINDOW, Decision, RateLimiter, RateLimiterBuilder};
pub use window::SlidingWindow;

use std::error::Error;
use std::fmt;

/// Errors that can occur while building a rate limiter
///
/// # Variants
///
/// - [`InvalidRate`](AdmissionError::InvalidRate): The per-second rate was zero
/// - [`InvalidWindow`](AdmissionError::InvalidWindow): The sliding window length was zero
///
/// # Example
///
/// ```
/// use keyrelay::{AdmissionError, RateLimiter};
///
/// match RateLimiter::builder().per_second(0).build() {
///     Err(AdmissionError::InvalidRate) => println!("a channel needs a positive rate"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The per-second rate cap was zero
    InvalidRate,
    /// The sliding window length was zero
    InvalidWindow,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::InvalidRate => write!(f, "per-second rate must be positive"),
            AdmissionError::InvalidWindow => write!(f, "sliding window must be longer than zero"),
        }
    }
}

impl Error for AdmissionError {}
