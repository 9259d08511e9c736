//! Worker-pool dispatch strategy
//!
//! A [`PoolBridge`] checks the shared queue once per cadence tick and hands
//! each fresh request to a blocking slot from a bounded pool. The slot makes
//! the call, records the outcome, then stays occupied until the nominal TTL
//! budget has passed. Pool size therefore caps how many calls one channel can
//! start per TTL period; there is no sliding-window limiter on this path.

use crate::outcome;
use crate::types::{ApiCall, Channel, Request};
use crate::worker::{DispatchContext, Dispatcher, send_bounded};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Default number of concurrent blocking slots per channel
pub const DEFAULT_POOL_SIZE: usize = 20;

// tokio intervals reject a zero period
const MIN_CADENCE: Duration = Duration::from_micros(100);

pub struct PoolBridge {
    channel: Channel,
    ctx: DispatchContext,
    cadence: Duration,
    pool_size: usize,
    slots: Arc<Semaphore>,
    ticker: Option<Interval>,
}

impl PoolBridge {
    /// Poll every `cadence` and run calls on at most `pool_size` slots
    pub fn new(channel: Channel, ctx: DispatchContext, cadence: Duration, pool_size: usize) -> Self {
        Self {
            channel,
            ctx,
            cadence: cadence.max(MIN_CADENCE),
            pool_size,
            slots: Arc::new(Semaphore::new(pool_size)),
            ticker: None,
        }
    }

    /// Number of slots not currently running a call
    pub fn idle_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Pop until a request that is still within its TTL turns up
    ///
    /// Stale requests met on the way are dropped as expired in the queue.
    fn next_fresh(&self) -> Option<Request> {
        while let Some(request) = self.ctx.queue.try_pop() {
            self.ctx.metrics.record_dequeued();

            match self.ctx.ttl.admit_from_queue(&request, Instant::now()) {
                Ok(_) => return Some(request),
                Err(err) => outcome::record_error(&self.ctx.metrics, request.id, err),
            }
        }
        None
    }

    fn dispatch(&self, request: Request, permit: OwnedSemaphorePermit) {
        let unit = BlockingUnit {
            call: ApiCall::new(&self.channel, &request),
            ctx: self.ctx.clone(),
            runtime: Handle::current(),
            permit,
        };
        tokio::task::spawn_blocking(move || unit.run());
    }
}

#[async_trait]
impl Dispatcher for PoolBridge {
    fn channel(&self) -> &Channel {
        &self.channel
    }

    async fn serve_one(&mut self) {
        let cadence = self.cadence;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;

        // Claim a slot first: with the pool exhausted the backlog stays
        // available to other channels
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            tracing::trace!("No idle slot for {}", self.channel.label());
            return;
        };

        if let Some(request) = self.next_fresh() {
            self.dispatch(request, permit);
        }
    }

    async fn finish(&mut self) {
        // Every slot back in the pool means no call is still running
        let all = u32::try_from(self.pool_size).unwrap_or(u32::MAX);
        if let Ok(permits) = self.slots.acquire_many(all).await {
            drop(permits);
        }
    }
}

/// One call running on a blocking slot
struct BlockingUnit {
    call: ApiCall,
    ctx: DispatchContext,
    runtime: Handle,
    permit: OwnedSemaphorePermit,
}

impl BlockingUnit {
    fn run(self) {
        let started = std::time::Instant::now();
        let req_id = self.call.req_id;

        let result = self.runtime.block_on(send_bounded(
            self.ctx.transport.as_ref(),
            self.call,
            self.ctx.call_timeout,
        ));
        outcome::record(&self.ctx.metrics, req_id, result);

        // Hold the slot for the rest of the TTL budget
        if let Some(rest) = self.ctx.ttl.budget.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
        drop(self.permit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::exchange::ExchangeState;
    use crate::metrics::Metrics;
    use crate::queue::SharedQueue;
    use crate::shutdown::ShutdownTrigger;
    use crate::transport::{LoopbackTransport, Transport};
    use crate::ttl::TtlPolicy;
    use crate::types::ApiResponse;
    use crate::worker::run_dispatcher;
    use parking_lot::Mutex;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn context(ttl: Duration) -> DispatchContext {
        DispatchContext {
            queue: SharedQueue::new(),
            transport: Arc::new(LoopbackTransport::new(ExchangeState::new(1000).unwrap())),
            metrics: Arc::new(Metrics::new()),
            ttl: TtlPolicy::new(ttl),
            call_timeout: ms(1000),
        }
    }

    /// Notes the wall-clock time each call reaches the transport
    #[derive(Default)]
    struct CallClock {
        calls: Mutex<Vec<std::time::Instant>>,
    }

    #[async_trait]
    impl Transport for CallClock {
        async fn send(&self, call: ApiCall) -> Result<ApiResponse, DispatchError> {
            self.calls.lock().push(std::time::Instant::now());
            Ok(ApiResponse {
                status_code: 200,
                body: serde_json::json!({"status": "OK", "req_id": call.req_id}),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_caps_calls_per_ttl() {
        let ctx = context(ms(100));
        for id in 0..10 {
            ctx.queue.push(Request::new(id));
        }

        let bridge = PoolBridge::new(Channel::new("key-a"), ctx.clone(), ms(10), 2);
        let (trigger, shutdown) = ShutdownTrigger::new();
        let task = tokio::spawn(run_dispatcher(Box::new(bridge), shutdown));

        tokio::time::sleep(ms(300)).await;
        trigger.trigger();
        task.await.unwrap();

        // Two slots start calls, then stay busy until the rest have expired
        let totals = ctx.metrics.totals();
        assert!(totals.sent >= 2, "sent {}", totals.sent);
        assert_eq!(totals.sent + totals.dropped_queue, 10);
        assert_eq!(totals.dequeued, 10);
        assert!(ctx.queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_exhausted_pool_leaves_queue_alone() {
        let ctx = context(ms(1000));
        let mut bridge = PoolBridge::new(Channel::new("key-b"), ctx.clone(), ms(5), 1);

        ctx.queue.push(Request::new(0));
        bridge.serve_one().await;
        assert_eq!(bridge.idle_slots(), 0);

        ctx.queue.push(Request::new(1));
        bridge.serve_one().await;
        bridge.serve_one().await;

        // The only slot is busy, so the second request is still queued
        assert_eq!(ctx.queue.len(), 1);
        assert_eq!(ctx.metrics.totals().dequeued, 1);

        bridge.finish().await;
        assert_eq!(bridge.idle_slots(), 1);
        assert_eq!(ctx.metrics.totals().sent, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_queue_returns_slot() {
        let ctx = context(ms(1000));
        let mut bridge = PoolBridge::new(Channel::new("key-c"), ctx.clone(), ms(5), 3);

        bridge.serve_one().await;
        assert_eq!(bridge.idle_slots(), 3);
        assert_eq!(ctx.metrics.totals().dequeued, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_calls_follow_cadence() {
        let clock = Arc::new(CallClock::default());
        let ctx = DispatchContext {
            transport: clock.clone(),
            ..context(ms(500))
        };
        for id in 0..50 {
            ctx.queue.push(Request::new(id));
        }

        // Plenty of slots and a fresh backlog, so only the cadence paces calls
        let bridge = PoolBridge::new(Channel::new("key-d"), ctx.clone(), ms(40), 50);
        let (trigger, shutdown) = ShutdownTrigger::new();
        let task = tokio::spawn(run_dispatcher(Box::new(bridge), shutdown));

        tokio::time::sleep(ms(400)).await;
        trigger.trigger();
        task.await.unwrap();

        let mut calls = clock.calls.lock().clone();
        calls.sort();

        // One call per tick, the first tick completing immediately
        assert!((5..=11).contains(&calls.len()), "{} calls", calls.len());
        for pair in calls.windows(2) {
            let gap = pair[1] - pair[0];
            // Timer granularity can shift a single tick by a few milliseconds
            assert!(gap >= ms(30), "calls {gap:?} apart");
        }
        assert_eq!(ctx.metrics.totals().sent, calls.len() as u64);
    }
}
