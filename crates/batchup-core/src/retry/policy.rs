use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP status codes, curl errors and local I/O failures into
/// these kinds (see `classify`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect, stalled upload, 408).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Any other error (never retried).
    Other,
}

impl ErrorKind {
    /// Whether a request failing this way is worth another attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps. Built from `[retry]` in config.toml
/// via `RetryConfig::to_policy`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        if !kind.is_retryable() {
            return RetryDecision::NoRetry;
        }

        // base * 2^(attempt-1); throttling waits one extra doubling.
        let mut exp = 1u32 << attempt.saturating_sub(1).min(8);
        if kind == ErrorKind::Throttled {
            exp = exp.saturating_mul(2);
        }
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_for_other() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: 20,
            ..RetryPolicy::default()
        };
        let d1 = match p.decide(1, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        let d2 = match p.decide(2, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d2 >= d1);

        // Very high attempt should cap at max_delay
        let d_last = match p.decide(10, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d_last <= p.max_delay);
    }

    #[test]
    fn throttling_backs_off_harder() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.decide(1, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_millis(250))
        );
        assert_eq!(
            p.decide(1, ErrorKind::Throttled),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert!(!ErrorKind::Other.is_retryable());
        assert!(ErrorKind::Http5xx(502).is_retryable());
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert!(matches!(
            p.decide(1, ErrorKind::Throttled),
            RetryDecision::RetryAfter(_)
        ));
        assert!(matches!(
            p.decide(2, ErrorKind::Throttled),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(
            p.decide(3, ErrorKind::Throttled),
            RetryDecision::NoRetry
        );
    }
}

