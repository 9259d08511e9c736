//! Outbound call implementations
//!
//! Dispatch strategies never talk to the network directly. They hand an
//! [`ApiCall`] to a [`Transport`] and get back the status code and JSON body.
//!
//! # Available Transports
//!
//! - [`http`]: `GET` with query parameters over reqwest
//! - [`loopback`]: in-process exchange emulation, for offline runs and tests

pub mod http;
pub mod loopback;

#[cfg(test)]
mod http_test;

pub use http::HttpTransport;
pub use loopback::LoopbackTransport;

use crate::error::DispatchError;
use crate::types::{ApiCall, ApiResponse};
use async_trait::async_trait;

/// Common interface for all transport implementations
///
/// A transport performs exactly one call per invocation and never retries.
/// Callers bound the call with their own timeout; a transport may additionally
/// enforce one and report it as [`DispatchError::TransportTimeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one call and wait for the remote's answer
    ///
    /// A non-success payload is still an `Ok` response; classifying it is the
    /// caller's job.
    async fn send(&self, call: ApiCall) -> Result<ApiResponse, DispatchError>;
}
