//! FIFO of prepared chunks between the producer and the consumer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::speech::Playable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub ordinal: usize,
    pub text_len: usize,
    pub playable: Playable,
}

/// Owned by exactly one session.
pub struct AudioQueue {
    items: Mutex<VecDeque<QueueItem>>,
    notify: Notify,
    feeding: AtomicBool,
}

impl Default for AudioQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            feeding: AtomicBool::new(true),
        }
    }

    pub fn push(&self, item: QueueItem) {
        self.lock().push_back(item);
        self.notify.notify_one();
    }

    /// Marks that no more items will be pushed.
    pub fn finish_feeding(&self) {
        self.feeding.store(false, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_feeding(&self) -> bool {
        self.feeding.load(Ordering::SeqCst)
    }

    /// Waits for the next item. Returns `None` once the queue is drained and
    /// feeding has finished, or when `token` is cancelled.
    pub async fn next(&self, token: &CancellationToken) -> Option<QueueItem> {
        loop {
            let notified = self.notify.notified();
            if token.is_cancelled() {
                return None;
            }
            if let Some(item) = self.lock().pop_front() {
                return Some(item);
            }
            if !self.is_feeding() {
                return None;
            }
            tokio::select! {
                () = notified => {}
                () = token.cancelled() => return None,
            }
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
