//! # keyrelay dispatcher
//!
//! Sends a stream of API requests through several API keys at once, keeping
//! every key under its request-rate cap and discarding requests that have
//! waited too long to be worth sending.
//!
//! ## Purpose
//!
//! Remote APIs commonly cap each key at `R` requests per second. When work
//! arrives faster than one key may send it, the backlog has to be spread over
//! several keys without ever breaking any key's contract. keyrelay:
//!
//! - **Shares one backlog** between all keys, first in first out
//! - **Gates each key** with its own sliding-window limiter from the
//!   [`keyrelay`] crate
//! - **Drops stale requests** whose age exceeds a time-to-live instead of
//!   sending them late
//! - **Reports throughput** once per second
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! keyrelay --help
//!
//! # Two keys against the built-in mock exchange for one minute
//! keyrelay --api-keys KEY1,KEY2 --mock-exchange --duration-secs 60 --log-file run.log
//!
//! # Compare with the worker-pool strategy
//! keyrelay --api-keys KEY1,KEY2 --mock-exchange --strategy pool --duration-secs 60
//!
//! # Summarize a run
//! keyrelay --analyze run.log
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or `KEYRELAY_*` environment variables (CLI takes
//! precedence). See [`config`] or run `keyrelay --list-env-vars`.
//!
//! ## Dispatch Strategies
//!
//! - **async** ([`worker::KeyWorker`]): one task per key pops a request, waits
//!   for the key's limiter, and awaits the call
//! - **pool** ([`bridge::PoolBridge`]): one task per key polls the queue at the
//!   key's spacing and runs each call on a bounded pool of blocking slots
//!
//! ## Architecture
//!
//! ```text
//!                ┌───────────────┐
//!                │ RequestSource │
//!                └───────┬───────┘
//!                        │ push
//!                 ┌──────▼──────┐
//!                 │ SharedQueue │
//!                 └──────┬──────┘
//!          ┌─────────────┼─────────────┐
//!          │ pop         │ pop         │ pop
//!    ┌─────▼─────┐ ┌─────▼─────┐ ┌─────▼─────┐
//!    │ key 1     │ │ key 2     │ │ key N     │
//!    │ TTL check │ │ TTL check │ │ TTL check │
//!    │ limiter   │ │ limiter   │ │ limiter   │
//!    └─────┬─────┘ └─────┬─────┘ └─────┬─────┘
//!          └─────────────┼─────────────┘
//!                  ┌─────▼─────┐
//!                  │ Transport │
//!                  └───────────┘
//! ```
//!
//! ## Log Format
//!
//! Each event is one line, `<RFC 3339 time> - <target> - <LEVEL> - <message>`,
//! which [`analysis`] reads back:
//!
//! ```text
//! 2025-03-01T12:00:00.051234Z - keyrelay_dispatcher::outcome - INFO - API response: status 200, resp {"nonce":1740830400051,"req_id":17,"status":"OK"}
//! 2025-03-01T12:00:00.052001Z - keyrelay_dispatcher::outcome - WARNING - ignoring request 18 from queue due to TTL
//! 2025-03-01T12:00:01.000113Z - keyrelay_dispatcher::accountant - INFO - Throughput: 40 requests made / second, 42 dequeued, 3 queued
//! ```

pub mod accountant;
pub mod analysis;
pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod exchange;
pub mod limiter;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod queue;
pub mod shutdown;
pub mod source;
pub mod transport;
pub mod ttl;
pub mod types;
pub mod worker;

pub use config::Config;
pub use error::DispatchError;
pub use shutdown::{Shutdown, ShutdownTrigger};
