//! Error types for the polling fetcher

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for fetcher operations
pub type Result<T> = std::result::Result<T, FetcherError>;

/// Main error type for the polling fetcher
#[derive(Error, Debug)]
pub enum FetcherError {
    /// Required configuration is missing or invalid. Only raised by initialization.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The metadata probe (HEAD) failed. Session state is unchanged.
    #[error("HEAD request failed: {0}")]
    Probe(#[source] BackendError),

    /// The full retrieval (GET) failed. The change token has already advanced.
    #[error("GET request failed: {0}")]
    Retrieval(#[source] BackendError),

    /// The object was expected to be gzip but its header did not decode.
    /// Decoding is disabled for the rest of the fetcher's life.
    #[error("Gzip decode error: {0}")]
    Decode(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetcherError {
    /// Check if the next scheduled fetch may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetcherError::Probe(_) | FetcherError::Retrieval(_))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(FetcherError::Probe("timeout".into()).is_retryable());
        assert!(FetcherError::Retrieval("reset".into()).is_retryable());
        assert!(!FetcherError::config("S3 key not set").is_retryable());
        assert!(!FetcherError::Cancelled.is_retryable());
        assert!(!FetcherError::Decode(std::io::ErrorKind::InvalidData.into()).is_retryable());
    }

    #[test]
    fn test_display_wraps_cause() {
        let err = FetcherError::Probe("NoSuchKey".into());
        assert_eq!(err.to_string(), "HEAD request failed: NoSuchKey");

        let err = FetcherError::config("S3 bucket not set");
        assert_eq!(err.to_string(), "Configuration error: S3 bucket not set");
    }
}
