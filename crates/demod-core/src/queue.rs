//! Thread-safe FIFO queues connecting the manager and the worker threads
//!
//! A [`ThreadQueue`] keeps both ends of a crossbeam channel, so any clone can
//! push or pop and the channel never reports disconnection while a clone is
//! alive. Workers block on [`ThreadQueue::pop`] (or `select!` over
//! [`ThreadQueue::receiver`]); the manager only ever drains with
//! [`ThreadQueue::try_pop`] so its polling never blocks.
//!
//! ```text
//! manager ──push──► [ sample | command ] ──pop──► processing worker
//!                                                   │
//!                      [ audio ] ◄──────push────────┘
//!                          │
//!                          └──pop──► output worker
//!
//! both workers ──push──► [ notify ] ──try_pop──► owner (is_terminated)
//! ```

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::time::Duration;

/// Cloneable handle to a FIFO shared between threads
pub struct ThreadQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for ThreadQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ThreadQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadQueue")
            .field("len", &self.rx.len())
            .field("capacity", &self.rx.capacity())
            .finish()
    }
}

impl<T> Default for ThreadQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> ThreadQueue<T> {
    /// Create a queue with no capacity limit
    pub fn unbounded() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Create a queue holding at most `capacity` items
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Bounded if a capacity is given, unbounded otherwise
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::unbounded(),
        }
    }

    /// Enqueue an item
    ///
    /// Never fails: this handle keeps the receiving end alive. On a bounded
    /// queue this waits for room, so real-time producers should prefer
    /// [`try_push`](Self::try_push).
    pub fn push(&self, item: T) {
        // Unreachable error: `self.rx` keeps the channel connected
        let _ = self.tx.send(item);
    }

    /// Enqueue without waiting, handing the item back if the queue is full
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) | TrySendError::Disconnected(item) => item,
        })
    }

    /// Dequeue the next item, waiting up to `timeout` (forever if `None`)
    pub fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        match timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).ok(),
            None => self.rx.recv().ok(),
        }
    }

    /// Dequeue the next item if one is already available
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Best-effort emptiness check, only a polling hint
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Receiving end for use in `crossbeam::select!`
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    /// Whether both handles refer to the same underlying queue
    pub fn same_queue(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}
