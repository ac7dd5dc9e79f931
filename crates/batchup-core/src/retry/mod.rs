//! Retry and backoff policy for a single upload request.
//!
//! The batch scheduler has its own, coarser retry (requeue at the head of the
//! queue). This module is the inner layer used by the HTTP executor: transient
//! failures (timeouts, throttling, connection resets, 5xx) are retried with
//! exponential backoff before the attempt is reported to the scheduler as a
//! failure.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::UploadError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
