//! Batch upload scheduler.
//!
//! Drives many transfers at once through a pluggable [`Uploader`], adapting
//! the number in flight to observed outcomes:
//! - the concurrency window starts at 3, grows by one per success and shrinks
//!   by one per failure, within `[min_window, ceiling(tier)]`
//! - a failed item is requeued at the head of the queue
//! - a run of consecutive failures (no success in between) reaching the
//!   failure threshold aborts the batch
//!
//! [`BatchState`] is the synchronous state machine; [`BatchScheduler`] is the
//! tokio actor that owns it and runs transfers as tasks.

mod observer;
mod progress;
mod queue;
mod run;
mod state;
mod uploader;
mod window;

pub use observer::{BatchEvent, BatchObserver, ChannelObserver, NoopObserver};
pub use progress::{FileProgress, ProgressTable};
pub use queue::PendingQueue;
pub use run::{BatchHandle, BatchOutcome, BatchScheduler};
pub use state::{Admission, BatchState, Settlement, Step};
pub use uploader::{percent_of, ProgressReporter, Uploader};
pub use window::ConcurrencyWindow;
