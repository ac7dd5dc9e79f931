//! Batch state machine: admission, completion handling and teardown.
//!
//! Everything here is synchronous and free of I/O. The async driver in
//! `scheduler::run` owns one `BatchState`, starts a transfer for every
//! [`Admission`] it hands out, and feeds each settled transfer back through
//! [`BatchState::settle`].

use std::collections::HashSet;

use crate::config::SchedulerConfig;
use crate::item::{Receipt, WorkItem};
use crate::tier::DeviceTier;

use super::observer::BatchObserver;
use super::progress::ProgressTable;
use super::queue::PendingQueue;
use super::window::ConcurrencyWindow;

/// An item popped from the queue, tagged with a unique attempt number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission<T> {
    pub attempt: u64,
    pub item: T,
}

/// How a transfer attempt ended.
#[derive(Debug)]
pub enum Settlement<T, R, E> {
    Success(R),
    Failure { item: T, error: E },
    /// The attempt ended without a success or a failure (e.g. the transfer
    /// task panicked). Only the slot is released.
    Inconsistent,
}

/// What the driver should do after a state transition.
#[derive(Debug)]
pub enum Step<T, R, E> {
    /// Keep running; start these newly admitted transfers (may be empty).
    Continue(Vec<Admission<T>>),
    /// Every item succeeded. The batch is torn down.
    Succeeded(Vec<R>),
    /// The circuit breaker tripped. The batch is torn down.
    Failed {
        error: E,
        results: Vec<R>,
        unresolved: Vec<T>,
    },
    /// The batch was already torn down; the settlement was discarded.
    Ignored,
}

/// Mutable state of one batch.
#[derive(Debug)]
pub struct BatchState<T, R> {
    items: Vec<T>,
    pending: PendingQueue<T>,
    in_flight: usize,
    window: ConcurrencyWindow,
    failure_threshold: u32,
    consecutive_failures: u32,
    results: Vec<R>,
    progress: ProgressTable,
    next_attempt: u64,
    destroyed: bool,
}

impl<T, R> BatchState<T, R>
where
    T: WorkItem,
    R: Receipt,
{
    /// New batch over `items`. Nothing is admitted until [`BatchState::start`].
    pub fn new(items: Vec<T>, cfg: &SchedulerConfig, tier: DeviceTier) -> Self {
        let pending = PendingQueue::new(items.iter().cloned());
        Self {
            items,
            pending,
            in_flight: 0,
            window: ConcurrencyWindow::for_tier(cfg, tier),
            failure_threshold: cfg.failure_threshold.max(1),
            consecutive_failures: 0,
            results: Vec::new(),
            progress: ProgressTable::new(),
            next_attempt: 1,
            destroyed: false,
        }
    }

    /// Initial admission. An empty batch succeeds immediately with no results.
    pub fn start<E, O>(&mut self, observer: &mut O) -> Step<T, R, E>
    where
        O: BatchObserver<T, R, E>,
    {
        if self.destroyed {
            return Step::Ignored;
        }
        if self.items.is_empty() {
            tracing::info!("empty batch, nothing to upload");
            observer.on_success(&self.results);
            let results = std::mem::take(&mut self.results);
            self.destroy();
            return Step::Succeeded(results);
        }
        Step::Continue(self.fill_slots(observer))
    }

    /// Admit pending items while the window has room. Each admitted item gets
    /// a progress entry at 0% and the table is republished. No-op when the
    /// window is full, the queue is empty, or the batch is torn down.
    pub fn fill_slots<E, O>(&mut self, observer: &mut O) -> Vec<Admission<T>>
    where
        O: BatchObserver<T, R, E>,
    {
        let mut admitted = Vec::new();
        if self.destroyed {
            return admitted;
        }
        while self.in_flight < self.window.current() {
            let Some(item) = self.pending.pop() else {
                break;
            };
            self.in_flight += 1;
            let attempt = self.next_attempt;
            self.next_attempt += 1;

            tracing::debug!(
                item = item.name(),
                attempt,
                in_flight = self.in_flight,
                window = self.window.current(),
                "admitting transfer"
            );
            self.progress.start(attempt, item.name());
            observer.on_progress(&self.progress.snapshot());
            admitted.push(Admission { attempt, item });
        }
        admitted
    }

    /// Record a progress report for an in-flight attempt and republish the table.
    pub fn report_progress<E, O>(&mut self, attempt: u64, percent: u8, observer: &mut O)
    where
        O: BatchObserver<T, R, E>,
    {
        if self.destroyed {
            return;
        }
        if self.progress.update(attempt, percent) {
            observer.on_progress(&self.progress.snapshot());
        }
    }

    /// Handle a settled attempt: per-item success callbacks, progress cleanup,
    /// then the completion state machine.
    pub fn settle<E, O>(
        &mut self,
        attempt: u64,
        settlement: Settlement<T, R, E>,
        observer: &mut O,
    ) -> Step<T, R, E>
    where
        O: BatchObserver<T, R, E>,
    {
        if self.destroyed {
            tracing::trace!(attempt, "discarding settlement after teardown");
            return Step::Ignored;
        }

        if let Settlement::Success(ref receipt) = settlement {
            let count = self.results.len() + 1;
            observer.on_item_uploaded(count);
            observer.on_item_progress(receipt.id(), count);
        }

        if self.progress.remove(attempt) {
            observer.on_progress(&self.progress.snapshot());
        }

        self.complete(attempt, settlement, observer)
    }

    fn complete<E, O>(
        &mut self,
        attempt: u64,
        settlement: Settlement<T, R, E>,
        observer: &mut O,
    ) -> Step<T, R, E>
    where
        O: BatchObserver<T, R, E>,
    {
        self.in_flight = self.in_flight.saturating_sub(1);

        match settlement {
            Settlement::Failure { item, error } => {
                self.consecutive_failures += 1;
                tracing::debug!(
                    item = item.name(),
                    attempt,
                    failures = self.consecutive_failures,
                    "transfer failed, requeued at head"
                );
                self.pending.push_retry(item);

                if self.consecutive_failures >= self.failure_threshold {
                    let unresolved = self.unresolved();
                    tracing::warn!(
                        failures = self.consecutive_failures,
                        succeeded = self.results.len(),
                        unresolved = unresolved.len(),
                        "failure limit reached, aborting batch"
                    );
                    observer.on_failure(&error, &self.results, &unresolved);
                    let results = std::mem::take(&mut self.results);
                    self.destroy();
                    return Step::Failed {
                        error,
                        results,
                        unresolved,
                    };
                }
                self.window.shrink();
            }
            Settlement::Success(receipt) => {
                self.consecutive_failures = 0;
                self.results.push(receipt);

                if self.pending.is_empty() && self.results.len() >= self.items.len() {
                    tracing::info!(uploaded = self.results.len(), "batch complete");
                    observer.on_success(&self.results);
                    let results = std::mem::take(&mut self.results);
                    self.destroy();
                    return Step::Succeeded(results);
                }
                self.window.grow();
            }
            Settlement::Inconsistent => {
                tracing::error!(
                    attempt,
                    "transfer settled with neither a result nor an error; ignoring"
                );
            }
        }

        Step::Continue(self.fill_slots(observer))
    }

    /// Tear the batch down. Idempotent. In-flight transfers are not touched;
    /// their settlements are discarded.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            tracing::debug!(in_flight = self.in_flight, "batch torn down");
        }
        self.destroyed = true;
        self.results.clear();
        self.pending.clear();
    }

    /// Give up on a batch that can make no more progress: take the results so
    /// far and the unresolved items, then tear down.
    pub fn abandon(&mut self) -> (Vec<R>, Vec<T>) {
        let unresolved = self.unresolved();
        let results = std::mem::take(&mut self.results);
        self.destroy();
        (results, unresolved)
    }

    /// Original items whose id does not appear among the results, in
    /// original order.
    pub fn unresolved(&self) -> Vec<T> {
        let done: HashSet<&str> = self.results.iter().map(|r| r.id()).collect();
        self.items
            .iter()
            .filter(|i| !done.contains(i.id()))
            .cloned()
            .collect()
    }

    /// Nothing in flight, nothing pending, not finished: no settlement can
    /// ever arrive to move the batch forward.
    pub fn is_stalled(&self) -> bool {
        !self.destroyed && self.in_flight == 0 && self.pending.is_empty() && !self.items.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn window(&self) -> ConcurrencyWindow {
        self.window
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ids of pending items in admission order.
    pub fn pending_ids(&self) -> Vec<&str> {
        self.pending.iter().map(|i| i.id()).collect()
    }

    pub fn results(&self) -> &[R] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn progress(&self) -> &ProgressTable {
        &self.progress
    }
}
