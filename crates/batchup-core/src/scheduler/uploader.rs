//! The transfer executor seam and the progress handle passed to it.

use std::sync::Arc;

use async_trait::async_trait;

/// Moves one item and resolves with a receipt or an error.
///
/// Called once per admitted attempt; an item that failed may be handed to
/// `upload` again later. Implementations own their timeouts: an attempt that
/// never resolves holds its slot for the rest of the batch.
#[async_trait]
pub trait Uploader<T, R, E>: Send + Sync + 'static {
    async fn upload(&self, item: T, progress: ProgressReporter) -> Result<R, E>;
}

/// Destination of progress reports (the scheduler inbox).
pub(crate) trait ProgressSink: Send + Sync {
    fn progress(&self, attempt: u64, percent: u8);
}

struct DiscardProgress;

impl ProgressSink for DiscardProgress {
    fn progress(&self, _attempt: u64, _percent: u8) {}
}

/// Per-attempt handle for reporting transfer progress.
///
/// Cheap to clone and usable from any thread. Reports that arrive after the
/// attempt settled, or after the batch stopped, are ignored.
#[derive(Clone)]
pub struct ProgressReporter {
    attempt: u64,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    pub(crate) fn new(attempt: u64, sink: Arc<dyn ProgressSink>) -> Self {
        Self { attempt, sink }
    }

    /// Reporter that goes nowhere, for calling an uploader outside a batch.
    pub fn discard() -> Self {
        Self::new(0, Arc::new(DiscardProgress))
    }

    /// Report percent complete (values above 100 are clamped).
    pub fn report(&self, percent: u8) {
        self.sink.progress(self.attempt, percent.min(100));
    }

    /// Report `done` out of `total` units as a percentage. A zero total
    /// reports 100.
    pub fn report_fraction(&self, done: u64, total: u64) {
        self.report(percent_of(done, total));
    }
}

/// Integer percentage of `done / total`, floored, within 0..=100.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}
