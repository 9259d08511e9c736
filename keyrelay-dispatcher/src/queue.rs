//! Shared backlog drained by every channel
//!
//! A single unbounded FIFO with many producers and many consumers. Every
//! channel draws from the same instance; the backlog is never partitioned.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// Multi-consumer FIFO queue
///
/// Cloning yields another handle to the same queue.
///
/// - [`push`](SharedQueue::push) never blocks and never fails
/// - [`pop`](SharedQueue::pop) suspends until an item is available and hands
///   each item to exactly one caller
/// - [`try_pop`](SharedQueue::try_pop) returns `None` immediately when empty
///
/// Items leave in insertion order. Which waiting consumer receives the next
/// item is unspecified.
pub struct SharedQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> SharedQueue<T> {
    pub fn new() -> Self {
        SharedQueue {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                available: Notify::new(),
            }),
        }
    }

    /// Append an item and wake one waiting consumer
    pub fn push(&self, item: T) {
        self.inner.items.lock().push_back(item);
        self.inner.available.notify_one();
    }

    /// Take the oldest item, waiting for one if the queue is empty
    ///
    /// Cancel-safe: dropping the future before it completes loses no item.
    pub async fn pop(&self) -> T {
        loop {
            // Register interest before checking so a push in between still wakes us
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Take the oldest item if there is one
    pub fn try_pop(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        SharedQueue {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
