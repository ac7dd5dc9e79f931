//! Upload error type for retry classification.

use std::fmt;

/// Error returned by a single PUT attempt.
/// Kept typed so the retry layer can classify it before it reaches the scheduler.
#[derive(Debug)]
pub enum UploadError {
    /// Curl reported an error (timeout, stalled transfer, connection, etc.).
    Curl(curl::Error),
    /// Server answered with a non-2xx status.
    Http(u32),
    /// Server accepted the request before the whole body was sent.
    Incomplete { expected: u64, sent: u64 },
    /// Local file could not be opened or read. Not retried.
    Io(std::io::Error),
    /// Endpoint plus file name did not form a valid URL. Not retried.
    InvalidUrl(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Curl(e) => write!(f, "{}", e),
            UploadError::Http(code) => write!(f, "HTTP {}", code),
            UploadError::Incomplete { expected, sent } => {
                write!(f, "incomplete upload: sent {} of {} bytes", sent, expected)
            }
            UploadError::Io(e) => write!(f, "local file: {}", e),
            UploadError::InvalidUrl(msg) => write!(f, "invalid upload URL: {}", msg),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Curl(e) => Some(e),
            UploadError::Io(e) => Some(e),
            UploadError::Http(_) | UploadError::Incomplete { .. } | UploadError::InvalidUrl(_) => {
                None
            }
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::Io(e)
    }
}
