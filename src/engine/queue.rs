// src/engine/queue.rs

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

/// Result of a bounded wait on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived before the wait elapsed.
    Empty,
    /// The queue was closed; no item will ever arrive.
    Closed,
}

#[derive(Debug)]
struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Blocking FIFO of tasks whose prerequisites are all satisfied.
///
/// Semantics:
/// - `push` never blocks and hands each item to exactly one `pop`.
/// - `pop` suspends while the queue is empty and resolves with `None` once
///   the queue is closed.
/// - `close` is the "no more work will ever arrive" signal; idle workers wake
///   up and exit instead of waiting forever. Items still queued at that point
///   are dropped.
#[derive(Debug)]
pub struct ReadyQueue<T> {
    inner: Mutex<QueueInner<T>>,
    available: Notify,
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReadyQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        // The critical sections below cannot panic halfway through.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue an item. Returns `false` (and drops the item) if the queue has
    /// been closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            inner.items.push_back(item);
        }
        self.available.notify_one();
        true
    }

    /// Wait for the next item. `None` once the queue is closed.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if let Some(res) = self.try_pop() {
                return res;
            }
            notified.await;
        }
    }

    /// Like [`pop`](Self::pop), but gives up after `wait`.
    pub async fn pop_timeout(&self, wait: Duration) -> Pop<T> {
        match tokio::time::timeout(wait, self.pop()).await {
            Ok(Some(item)) => Pop::Item(item),
            Ok(None) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }

    /// `Some(Some(item))` if an item was taken, `Some(None)` if closed,
    /// `None` if the caller should wait.
    fn try_pop(&self) -> Option<Option<T>> {
        let mut inner = self.lock();
        if inner.closed {
            return Some(None);
        }
        inner.items.pop_front().map(Some)
    }

    /// Signal that no more work will arrive and wake every waiter.
    pub fn close(&self) {
        let dropped = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let dropped = inner.items.len();
            inner.items.clear();
            dropped
        };
        debug!(dropped, "ready queue closed");
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}
