//! Bounded, shedding, single-consumer queue shared between workers.
//!
//! A [`SheddingQueue`] never blocks its producer.  When a push would exceed
//! the capacity, one item is discarded according to the queue's
//! [`Overflow`] policy:
//!
//! | Policy | Discarded item | Used for |
//! |--------|----------------|----------|
//! | `DropNewest` | the item being pushed | camera frames (capacity 2) |
//! | `DropOldest` | the head of the queue | results, utterances, responses |
//!
//! The consumer side offers a non-blocking [`try_pop`](SheddingQueue::try_pop),
//! a [`drain_latest`](SheddingQueue::drain_latest) for "newest wins" readers,
//! and an async [`pop`](SheddingQueue::pop) that parks on a
//! [`tokio::sync::Notify`] until an item arrives.  `pop` is cancel-safe, so
//! it can sit inside a `tokio::select!` next to a shutdown branch.
//!
//! # Example
//!
//! ```rust
//! use emotion_assistant::pipeline::{Overflow, Push, SheddingQueue};
//!
//! let frames = SheddingQueue::new(2, Overflow::DropNewest);
//! assert_eq!(frames.push(1), Push::Accepted);
//! assert_eq!(frames.push(2), Push::Accepted);
//! assert_eq!(frames.push(3), Push::Shed); // queue full → 3 is dropped
//! assert_eq!(frames.drain_latest(), Some(2));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Overflow / Push
// ---------------------------------------------------------------------------

/// What to discard when a push finds the queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Keep what is queued; discard the incoming item.
    DropNewest,
    /// Discard the oldest queued item to make room for the incoming one.
    DropOldest,
}

/// Outcome of a single [`SheddingQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// The item was queued without discarding anything.
    Accepted,
    /// The queue was full and the incoming item was discarded.
    Shed,
    /// The queue was full; the oldest item was discarded and the incoming
    /// item queued.
    Displaced,
}

// ---------------------------------------------------------------------------
// SheddingQueue
// ---------------------------------------------------------------------------

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    overflow: Overflow,
    ready: Notify,
    shed: AtomicU64,
}

/// Cloneable handle to a bounded queue.  All clones share the same storage.
pub struct SheddingQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SheddingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for SheddingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheddingQueue")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("overflow", &self.inner.overflow)
            .field("shed", &self.shed_count())
            .finish()
    }
}

impl<T> SheddingQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize, overflow: Overflow) -> Self {
        assert!(capacity > 0, "SheddingQueue capacity must be > 0");
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                overflow,
                ready: Notify::new(),
                shed: AtomicU64::new(0),
            }),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        // Every critical section is a single VecDeque operation, so a
        // poisoned lock still guards a consistent deque.
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `item` without blocking, shedding per the overflow policy.
    pub fn push(&self, item: T) -> Push {
        let outcome = {
            let mut items = self.items();
            if items.len() < self.inner.capacity {
                items.push_back(item);
                Push::Accepted
            } else {
                match self.inner.overflow {
                    Overflow::DropNewest => Push::Shed,
                    Overflow::DropOldest => {
                        items.pop_front();
                        items.push_back(item);
                        Push::Displaced
                    }
                }
            }
        };

        match outcome {
            Push::Accepted => self.inner.ready.notify_one(),
            Push::Displaced => {
                self.inner.shed.fetch_add(1, Ordering::Relaxed);
                self.inner.ready.notify_one();
            }
            Push::Shed => {
                self.inner.shed.fetch_add(1, Ordering::Relaxed);
            }
        }
        outcome
    }

    /// Take the oldest item, if any, without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items().pop_front()
    }

    /// Empty the queue and return only the newest item.
    pub fn drain_latest(&self) -> Option<T> {
        let mut items = self.items();
        let latest = items.pop_back();
        items.clear();
        latest
    }

    /// Wait until an item is available and take it.
    ///
    /// Cancel-safe: dropping the future never loses an item.
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.inner.ready.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Total number of items discarded by overflow since creation.
    pub fn shed_count(&self) -> u64 {
        self.inner.shed.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
