//! # keyrelay
//!
//! Client-side admission control for API credentials with a strict request-rate cap.
//!
//! ## Overview
//!
//! An exchange or SaaS API typically allows each API key `R` requests per second.
//! keyrelay's [`RateLimiter`] guards one key and answers a single question:
//! *may one more request go out right now?* It combines two rules:
//!
//! - **Sliding window**: at most `R` admissions inside any trailing second,
//!   tracked with a ring of `R` timestamps, so each check is O(1)
//! - **Minimum spacing**: consecutive admissions are at least `min_spacing` apart,
//!   which smooths bursts instead of spending the budget at the window boundary
//!
//! ## Quick Start
//!
//! ```
//! use keyrelay::{Decision, RateLimiter};
//! use std::time::{Duration, Instant};
//!
//! // 20 requests per second, spaced at least 50ms apart
//! let mut limiter = RateLimiter::new(20, Duration::from_millis(50)).unwrap();
//!
//! match limiter.try_admit(Instant::now()) {
//!     Decision::Admit => println!("send the request"),
//!     Decision::Wait(retry_after) => println!("try again in {retry_after:?}"),
//! }
//! ```
//!
//! ## Clock
//!
//! Every check takes the current [`Instant`](std::time::Instant) as an argument.
//! The limiter never reads the clock itself, which keeps it deterministic under
//! test and lets async callers feed it from a mockable runtime clock.
//!
//! ## Thread Safety
//!
//! A limiter belongs to exactly one channel and is driven by one task. It takes
//! `&mut self` and carries no locks. Sharing one across tasks requires a mutex:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use keyrelay::RateLimiter;
//!
//! let limiter = Arc::new(Mutex::new(RateLimiter::builder().per_second(10).build().unwrap()));
//! ```

pub mod core;

pub use core::{
    AdmissionError, DEFAULT_WINDOW, Decision, Rate, RateLimiter, RateLimiterBuilder, SlidingWindow,
};
