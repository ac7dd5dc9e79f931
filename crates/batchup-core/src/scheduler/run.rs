//! Async driver: one actor loop owns the batch state, transfers run as tasks.
//!
//! Transfer tasks never touch the state. They post progress reports and their
//! settlement to the actor's inbox; the loop applies messages one at a time
//! and starts a task for every admission the state machine hands back.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::config::SchedulerConfig;
use crate::item::{Receipt, WorkItem};
use crate::tier::DeviceTier;

use super::observer::BatchObserver;
use super::state::{Admission, BatchState, Settlement, Step};
use super::uploader::{ProgressReporter, ProgressSink, Uploader};

/// How a batch ended.
#[derive(Debug)]
pub enum BatchOutcome<T, R, E> {
    /// Every item was uploaded.
    Succeeded(Vec<R>),
    /// The failure limit was reached.
    Failed {
        error: E,
        results: Vec<R>,
        unresolved: Vec<T>,
    },
    /// Torn down through [`BatchHandle::destroy`].
    Destroyed,
    /// No transfer left in flight and nothing pending, yet not every item
    /// succeeded (a transfer vanished without settling properly).
    Stalled { results: Vec<R>, unresolved: Vec<T> },
}

impl<T, R, E> BatchOutcome<T, R, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded(_))
    }
}

enum Msg<T, R, E> {
    Progress { attempt: u64, percent: u8 },
    Settled {
        attempt: u64,
        settlement: Settlement<T, R, E>,
    },
    Destroy,
}

/// Sending half of the inbox, shared by reporters and handles.
struct Inbox<T, R, E>(mpsc::UnboundedSender<Msg<T, R, E>>);

impl<T, R, E> ProgressSink for Inbox<T, R, E>
where
    T: Send,
    R: Send,
    E: Send,
{
    fn progress(&self, attempt: u64, percent: u8) {
        let _ = self.0.send(Msg::Progress { attempt, percent });
    }
}

trait DestroySink: Send + Sync {
    fn destroy(&self);
}

impl<T, R, E> DestroySink for Inbox<T, R, E>
where
    T: Send,
    R: Send,
    E: Send,
{
    fn destroy(&self) {
        let _ = self.0.send(Msg::Destroy);
    }
}

/// Cloneable control handle for a running batch.
#[derive(Clone)]
pub struct BatchHandle {
    inbox: Arc<dyn DestroySink>,
    finished: Arc<AtomicBool>,
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl BatchHandle {
    /// Tear the batch down. Idempotent; a no-op once the batch finished.
    /// Transfers already running are left to finish on their own and their
    /// results are discarded.
    pub fn destroy(&self) {
        if !self.is_finished() {
            self.inbox.destroy();
        }
    }

    /// True once the driver loop has returned.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Drives one batch of uploads to completion.
pub struct BatchScheduler<T, R, E, U, O> {
    state: BatchState<T, R>,
    uploader: Arc<U>,
    observer: O,
    tx: Arc<Inbox<T, R, E>>,
    rx: mpsc::UnboundedReceiver<Msg<T, R, E>>,
    finished: Arc<AtomicBool>,
}

impl<T, R, E, U, O> BatchScheduler<T, R, E, U, O>
where
    T: WorkItem,
    R: Receipt,
    E: Send + 'static,
    U: Uploader<T, R, E>,
    O: BatchObserver<T, R, E>,
{
    /// Prepare a batch. The work list is copied into the pending queue;
    /// nothing starts until [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn new(
        items: Vec<T>,
        uploader: U,
        observer: O,
        tier: DeviceTier,
        cfg: &SchedulerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!(
            items = items.len(),
            %tier,
            max_window = cfg.max_window(tier),
            "batch created"
        );
        Self {
            state: BatchState::new(items, cfg, tier),
            uploader: Arc::new(uploader),
            observer,
            tx: Arc::new(Inbox(tx)),
            rx,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for tearing the batch down from elsewhere.
    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            inbox: self.tx.clone(),
            finished: Arc::clone(&self.finished),
        }
    }

    /// Run the batch on a new task.
    pub fn spawn(self) -> (BatchHandle, tokio::task::JoinHandle<BatchOutcome<T, R, E>>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Admit the first transfers, then process the inbox until the batch stops.
    pub async fn run(mut self) -> BatchOutcome<T, R, E> {
        // Nothing but a teardown can be queued before the first admission.
        if let Ok(Msg::Destroy) = self.rx.try_recv() {
            tracing::info!("batch destroyed before it started");
            self.state.destroy();
            return self.finish(BatchOutcome::Destroyed);
        }

        let step = self.state.start(&mut self.observer);
        if let Some(outcome) = self.apply(step) {
            return self.finish(outcome);
        }

        loop {
            if self.state.is_stalled() {
                tracing::warn!(
                    succeeded = self.state.results().len(),
                    total = self.state.total(),
                    "nothing in flight and nothing pending; stopping stalled batch"
                );
                let (results, unresolved) = self.state.abandon();
                return self.finish(BatchOutcome::Stalled {
                    results,
                    unresolved,
                });
            }

            // The scheduler holds a sender itself, so recv only ends if that is gone.
            let Some(msg) = self.rx.recv().await else {
                self.state.destroy();
                return self.finish(BatchOutcome::Destroyed);
            };

            match msg {
                Msg::Progress { attempt, percent } => {
                    self.state
                        .report_progress(attempt, percent, &mut self.observer);
                }
                Msg::Settled {
                    attempt,
                    settlement,
                } => {
                    let step = self.state.settle(attempt, settlement, &mut self.observer);
                    if let Some(outcome) = self.apply(step) {
                        return self.finish(outcome);
                    }
                }
                Msg::Destroy => {
                    tracing::info!(
                        in_flight = self.state.in_flight(),
                        "batch destroyed by caller"
                    );
                    self.state.destroy();
                    return self.finish(BatchOutcome::Destroyed);
                }
            }
        }
    }

    /// Start admitted transfers, or turn a terminal step into an outcome.
    fn apply(&mut self, step: Step<T, R, E>) -> Option<BatchOutcome<T, R, E>> {
        match step {
            Step::Continue(admitted) => {
                for admission in admitted {
                    self.start_transfer(admission);
                }
                None
            }
            Step::Ignored => None,
            Step::Succeeded(results) => Some(BatchOutcome::Succeeded(results)),
            Step::Failed {
                error,
                results,
                unresolved,
            } => Some(BatchOutcome::Failed {
                error,
                results,
                unresolved,
            }),
        }
    }

    fn start_transfer(&self, admission: Admission<T>) {
        let Admission { attempt, item } = admission;
        let uploader = Arc::clone(&self.uploader);
        let inbox = Arc::clone(&self.tx);
        let reporter = ProgressReporter::new(attempt, inbox.clone());

        tokio::spawn(async move {
            let retry_item = item.clone();
            let name = retry_item.name().to_string();
            let result = AssertUnwindSafe(uploader.upload(item, reporter))
                .catch_unwind()
                .await;
            let settlement = match result {
                Ok(Ok(receipt)) => Settlement::Success(receipt),
                Ok(Err(error)) => Settlement::Failure {
                    item: retry_item,
                    error,
                },
                Err(_) => {
                    tracing::error!(item = %name, attempt, "transfer panicked");
                    Settlement::Inconsistent
                }
            };
            // Fails only when the batch already stopped: the result is discarded.
            let _ = inbox.0.send(Msg::Settled {
                attempt,
                settlement,
            });
        });
    }

    fn finish(self, outcome: BatchOutcome<T, R, E>) -> BatchOutcome<T, R, E> {
        self.finished.store(true, Ordering::Release);
        outcome
    }
}
