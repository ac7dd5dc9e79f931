//! Retry loop: run a blocking request until success or policy says stop.

use super::classify;
use super::error::UploadError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f` until it succeeds or the retry policy says to stop.
/// `f` receives the 1-based attempt number. On retryable failure the calling
/// thread sleeps for the backoff delay, so call this from a blocking context.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, UploadError>
where
    F: FnMut(u32) -> Result<T, UploadError>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(
                            attempt,
                            ?kind,
                            delay_ms = d.as_millis() as u64,
                            "retrying request: {}",
                            e
                        );
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
