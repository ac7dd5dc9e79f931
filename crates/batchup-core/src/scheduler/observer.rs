//! Observer callbacks and a channel-backed observer for UIs.

use std::fmt::Display;

use crate::item::{Receipt, WorkItem};

use super::progress::FileProgress;

/// Sinks for batch events. Every method defaults to a no-op.
///
/// Callbacks run on the scheduler's own loop, one at a time, so
/// implementations may keep plain mutable state. They must not block.
pub trait BatchObserver<T, R, E>: Send + 'static {
    /// A transfer succeeded; `count` is the number of successes so far, this one included.
    fn on_item_uploaded(&mut self, _count: usize) {}

    /// Same moment as `on_item_uploaded`, with the receipt's id.
    fn on_item_progress(&mut self, _receipt_id: &str, _count: usize) {}

    /// The in-flight progress table changed.
    fn on_progress(&mut self, _snapshot: &[FileProgress]) {}

    /// The failure circuit breaker tripped. Called at most once.
    fn on_failure(&mut self, _error: &E, _results: &[R], _unresolved: &[T]) {}

    /// Every item succeeded. Called at most once.
    fn on_success(&mut self, _results: &[R]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<T, R, E> BatchObserver<T, R, E> for NoopObserver {}

/// Owned form of an observer callback, for consumers on another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    ItemUploaded { count: usize },
    ItemProgress { receipt_id: String, count: usize },
    Progress(Vec<FileProgress>),
    Failed {
        error: String,
        succeeded: usize,
        /// Names of the items that never succeeded.
        unresolved: Vec<String>,
    },
    Succeeded { count: usize },
}

/// Forwards every callback as a [`BatchEvent`] on an unbounded channel.
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: tokio::sync::mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<BatchEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }
}

impl<T, R, E> BatchObserver<T, R, E> for ChannelObserver
where
    T: WorkItem,
    R: Receipt,
    E: Display,
{
    fn on_item_uploaded(&mut self, count: usize) {
        self.send(BatchEvent::ItemUploaded { count });
    }

    fn on_item_progress(&mut self, receipt_id: &str, count: usize) {
        self.send(BatchEvent::ItemProgress {
            receipt_id: receipt_id.to_string(),
            count,
        });
    }

    fn on_progress(&mut self, snapshot: &[FileProgress]) {
        self.send(BatchEvent::Progress(snapshot.to_vec()));
    }

    fn on_failure(&mut self, error: &E, results: &[R], unresolved: &[T]) {
        self.send(BatchEvent::Failed {
            error: error.to_string(),
            succeeded: results.len(),
            unresolved: unresolved.iter().map(|i| i.name().to_string()).collect(),
        });
    }

    fn on_success(&mut self, results: &[R]) {
        self.send(BatchEvent::Succeeded {
            count: results.len(),
        });
    }
}
