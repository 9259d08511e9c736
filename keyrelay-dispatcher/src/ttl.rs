//! Request expiry policy

use crate::error::DispatchError;
use crate::types::{DropStage, Request};
use std::time::Duration;
use tokio::time::Instant;

/// Maximum age a request may reach before it is discarded instead of sent
///
/// `grace` is extra slack added on top of the budget when computing the time
/// left. It exists to compensate for scheduling overhead between dequeue and
/// send and defaults to zero; it is the only tuning offset in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub budget: Duration,
    pub grace: Duration,
}

impl TtlPolicy {
    pub fn new(budget: Duration) -> Self {
        TtlPolicy {
            budget,
            grace: Duration::ZERO,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Time left before `request` expires, or `None` if it already has
    pub fn remaining(&self, request: &Request, now: Instant) -> Option<Duration> {
        let remaining = (self.budget + self.grace).saturating_sub(request.age(now));
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Time left for a request just taken off the queue
    ///
    /// # Errors
    ///
    /// [`DispatchError::StaleRequest`] with [`DropStage::Queue`] once the
    /// request has expired.
    pub fn admit_from_queue(&self, request: &Request, now: Instant) -> Result<Duration, DispatchError> {
        self.remaining(request, now)
            .ok_or(DispatchError::StaleRequest {
                id: request.id,
                stage: DropStage::Queue,
            })
    }
}
