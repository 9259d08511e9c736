//! Dispatch strategies
//!
//! A dispatch strategy drains the shared queue on behalf of one channel. Two
//! implementations exist behind [`Dispatcher`]:
//!
//! - [`KeyWorker`]: pops, waits for its own sliding-window limiter, then
//!   awaits the call in place
//! - [`PoolBridge`](crate::bridge::PoolBridge): polls on a fixed cadence and
//!   hands each call to a bounded pool of blocking slots
//!
//! [`run_dispatcher`] drives either one until shutdown.

use crate::error::DispatchError;
use crate::limiter::ChannelLimiter;
use crate::metrics::Metrics;
use crate::outcome;
use crate::queue::SharedQueue;
use crate::shutdown::Shutdown;
use crate::transport::Transport;
use crate::ttl::TtlPolicy;
use crate::types::{ApiCall, ApiResponse, Channel, Request};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default upper bound on a single transport call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Which [`Dispatcher`] implementation serves each channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStrategy {
    /// [`KeyWorker`]
    #[default]
    Async,
    /// [`PoolBridge`](crate::bridge::PoolBridge)
    Pool,
}

impl FromStr for DispatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "async" => Ok(DispatchStrategy::Async),
            "pool" => Ok(DispatchStrategy::Pool),
            _ => Err(format!("Invalid strategy: {s}. Valid options are: async, pool")),
        }
    }
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStrategy::Async => write!(f, "async"),
            DispatchStrategy::Pool => write!(f, "pool"),
        }
    }
}

/// State shared by every channel's dispatcher
#[derive(Clone)]
pub struct DispatchContext {
    pub queue: SharedQueue<Request>,
    pub transport: Arc<dyn Transport>,
    pub metrics: Arc<Metrics>,
    pub ttl: TtlPolicy,
    pub call_timeout: Duration,
}

/// Serves one channel from the shared queue
#[async_trait]
pub trait Dispatcher: Send {
    fn channel(&self) -> &Channel;

    /// Take one unit of backlog and see it through
    ///
    /// Per-request failures are recorded, never returned.
    async fn serve_one(&mut self);

    /// Wait for work started by [`serve_one`](Dispatcher::serve_one) that
    /// outlives it
    async fn finish(&mut self) {}
}

/// Run `dispatcher` until shutdown is signalled
pub async fn run_dispatcher(mut dispatcher: Box<dyn Dispatcher>, mut shutdown: Shutdown) {
    tracing::debug!("Dispatcher for {} started", dispatcher.channel().label());

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = dispatcher.serve_one() => {}
        }
    }

    dispatcher.finish().await;
    tracing::debug!("Dispatcher for {} stopped", dispatcher.channel().label());
}

/// Send `call`, giving up after `call_timeout`
pub async fn send_bounded(
    transport: &dyn Transport,
    call: ApiCall,
    call_timeout: Duration,
) -> Result<ApiResponse, DispatchError> {
    tokio::time::timeout(call_timeout, transport.send(call))
        .await
        .map_err(|_| DispatchError::TransportTimeout {
            after: call_timeout,
        })?
}

/// Async dispatcher: one task per channel, gated by its own limiter
pub struct KeyWorker {
    channel: Channel,
    limiter: ChannelLimiter,
    ctx: DispatchContext,
}

impl KeyWorker {
    pub fn new(channel: Channel, limiter: ChannelLimiter, ctx: DispatchContext) -> Self {
        Self {
            channel,
            limiter,
            ctx,
        }
    }

    pub fn limiter(&self) -> &ChannelLimiter {
        &self.limiter
    }

    async fn serve(&mut self, request: Request) -> Result<ApiResponse, DispatchError> {
        // A stale request never reaches the limiter
        let remaining = self.ctx.ttl.admit_from_queue(&request, Instant::now())?;

        self.limiter
            .acquire(remaining)
            .await
            .map_err(|e| e.into_stale(request.id))?;

        let call = ApiCall::new(&self.channel, &request);
        send_bounded(self.ctx.transport.as_ref(), call, self.ctx.call_timeout).await
    }
}

#[async_trait]
impl Dispatcher for KeyWorker {
    fn channel(&self) -> &Channel {
        &self.channel
    }

    async fn serve_one(&mut self) {
        let request = self.ctx.queue.pop().await;
        self.ctx.metrics.record_dequeued();

        let result = self.serve(request).await;
        outcome::record(&self.ctx.metrics, request.id, result);
    }
}
