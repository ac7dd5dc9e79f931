//! Pending work: FIFO admission with head-of-line retry.

use std::collections::VecDeque;

/// Items waiting for a transfer slot.
///
/// New items are served in order; an item that failed is pushed back to the
/// front so it is retried before anything that has never been attempted.
#[derive(Debug, Clone)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
}

impl<T> PendingQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Next item to admit.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Requeue a failed item ahead of everything else.
    pub fn push_retry(&mut self, item: T) {
        self.items.push_front(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
