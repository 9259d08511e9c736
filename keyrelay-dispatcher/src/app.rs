//! Process wiring
//!
//! [`run`] assembles the pipeline from a [`Config`]:
//!
//! ```text
//! RequestSource ──push──▶ SharedQueue ──pop──▶ Dispatcher × keys ──▶ Transport
//!                              │                      │
//!                              └──── len ───┐         └── outcome ──▶ Metrics
//!                                           ▼                            │
//!                                  ThroughputAccountant ◀──── sample ────┘
//! ```
//!
//! and keeps it running until the shutdown signal fires.

use crate::accountant::ThroughputAccountant;
use crate::bridge::PoolBridge;
use crate::config::Config;
use crate::exchange::{ExchangeState, MockExchange};
use crate::limiter::ChannelLimiter;
use crate::metrics::{Metrics, Totals};
use crate::queue::SharedQueue;
use crate::shutdown::Shutdown;
use crate::source::RequestSource;
use crate::transport::{HttpTransport, LoopbackTransport, Transport};
use crate::types::Channel;
use crate::worker::{DispatchContext, DispatchStrategy, Dispatcher, KeyWorker, run_dispatcher};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// What a finished run achieved
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub totals: Totals,
    /// Requests the source created
    pub produced: u64,
    /// Requests still queued at shutdown
    pub backlog: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Mean calls per second over the run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.totals.sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// Run the dispatcher until `shutdown` fires
///
/// # Errors
///
/// Only setup failures are returned: an invalid limiter configuration, a mock
/// exchange that cannot bind, or a transport that cannot be built.
pub async fn run(config: Config, shutdown: Shutdown) -> Result<RunSummary> {
    let started = Instant::now();
    let mut exchange_task = None;

    if let Some(mock) = &config.mock_exchange {
        let exchange = MockExchange::new(&mock.host, mock.port, mock.per_second_rate)?;
        let listener = TcpListener::bind(exchange.addr()).await?;
        let state = exchange.state().clone();
        exchange_task = Some(tokio::spawn(MockExchange::serve(listener, state)));
    }

    let transport: Arc<dyn Transport> = if config.loopback {
        let rate = config
            .mock_exchange
            .as_ref()
            .map_or(config.limiter.per_second_rate, |mock| mock.per_second_rate);
        tracing::info!("Answering calls in-process");
        Arc::new(LoopbackTransport::new(ExchangeState::new(rate)?))
    } else {
        Arc::new(HttpTransport::new(&config.url, config.call_timeout)?)
    };

    let queue = SharedQueue::new();
    let metrics = Arc::new(Metrics::new());
    let ctx = DispatchContext {
        queue: queue.clone(),
        transport,
        metrics: Arc::clone(&metrics),
        ttl: config.ttl_policy(),
        call_timeout: config.call_timeout,
    };

    let mut dispatchers = JoinSet::new();
    for key in &config.api_keys {
        let dispatcher = build_dispatcher(&config, Channel::new(key.as_str()), ctx.clone())?;
        dispatchers.spawn(run_dispatcher(dispatcher, shutdown.clone()));
    }

    tracing::info!(
        "Requests {} / second possible across {} keys",
        config.capacity_per_second(),
        config.api_keys.len()
    );
    tracing::info!(
        "Dispatching with the {} strategy, TTL {:?}, spacing {:?}",
        config.strategy,
        config.ttl,
        config.spacing()
    );

    let accountant = tokio::spawn(
        ThroughputAccountant::new(Arc::clone(&metrics), queue.clone()).run(shutdown.clone()),
    );
    let source = tokio::spawn(
        RequestSource::new(queue.clone(), config.arrival_pattern()).run(shutdown.clone()),
    );

    let produced = match source.await {
        Ok(produced) => produced,
        Err(e) => {
            tracing::error!("Request source panicked: {}", e);
            0
        }
    };

    while let Some(result) = dispatchers.join_next().await {
        if let Err(e) = result {
            tracing::error!("Dispatcher task panicked: {}", e);
        }
    }
    if let Err(e) = accountant.await {
        tracing::error!("Throughput accountant panicked: {}", e);
    }
    if let Some(task) = exchange_task {
        task.abort();
    }

    let summary = RunSummary {
        totals: metrics.totals(),
        produced,
        backlog: queue.len(),
        elapsed: started.elapsed(),
    };

    let totals = &summary.totals;
    tracing::info!(
        "Run finished after {:?}: {} produced, {} sent, {} dropped from queue, {} dropped in limiter, {} rejected, {} failed, {} still queued",
        summary.elapsed,
        summary.produced,
        totals.sent,
        totals.dropped_queue,
        totals.dropped_limiter,
        totals.rejected,
        totals.failed,
        summary.backlog
    );

    Ok(summary)
}

fn build_dispatcher(
    config: &Config,
    channel: Channel,
    ctx: DispatchContext,
) -> Result<Box<dyn Dispatcher>> {
    let dispatcher: Box<dyn Dispatcher> = match config.strategy {
        DispatchStrategy::Async => {
            let limiter = ChannelLimiter::new(config.build_limiter()?)
                .with_poll_interval(config.limiter.poll_interval);
            Box::new(KeyWorker::new(channel, limiter, ctx))
        }
        DispatchStrategy::Pool => Box::new(PoolBridge::new(
            channel,
            ctx,
            config.spacing(),
            config.pool_size,
        )),
    };
    Ok(dispatcher)
}
