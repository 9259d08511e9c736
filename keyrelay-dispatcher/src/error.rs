use crate::types::DropStage;
use std::time::Duration;
use thiserror::Error;

/// Per-request failures
///
/// None of these is fatal: a worker logs the error, counts it, and moves on
/// to the next request. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The request outlived its TTL before it could be sent
    #[error("ignoring request {id} {stage} due to TTL")]
    StaleRequest { id: u64, stage: DropStage },

    /// The rate limiter could not admit the request in time
    #[error("rate limiter timed out after {waited:?}")]
    LimiterTimeout { waited: Duration },

    /// The call exceeded its own time bound
    #[error("call timed out after {after:?}")]
    TransportTimeout { after: Duration },

    /// The call failed before a usable response arrived
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The remote answered with a non-success status
    #[error("remote rejected the call with status {status_code}")]
    RemoteRejection { status_code: u16 },
}

impl DispatchError {
    /// Turn a limiter timeout for request `id` into the stale-request drop it implies
    pub fn into_stale(self, id: u64) -> Self {
        match self {
            DispatchError::LimiterTimeout { .. } => DispatchError::StaleRequest {
                id,
                stage: DropStage::Limiter,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
