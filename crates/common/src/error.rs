//! Unified error type for risk-radar.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Source unavailable ({source_key}): {reason}")]
    SourceUnavailable { source_key: String, reason: String },

    #[error("Rate limited — {source_key} quota exhausted")]
    RateLimited { source_key: String },

    #[error("Malformed response from {source_key}: {reason}")]
    MalformedResponse { source_key: String, reason: String },

    #[error("Fetch from {source_key} timed out after {timeout_ms}ms")]
    Timeout { source_key: String, timeout_ms: u64 },

    #[error("Unknown risk category: {0}")]
    UnknownCategory(String),

    #[error("Invalid category set: {0}")]
    InvalidCategorySet(String),

    #[error("Invalid iteration count {got}: must be within [{min}, {max}]")]
    InvalidIterationCount { got: usize, min: usize, max: usize },

    #[error("Invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn unavailable(source_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            source_key: source_key.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(source_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            source_key: source_key.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller's input. These are surfaced as-is and never
    /// retried; everything else is a provider-side failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownCategory(_)
                | Error::InvalidCategorySet(_)
                | Error::InvalidIterationCount { .. }
                | Error::InvalidDistribution(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_are_classified() {
        assert!(Error::UnknownCategory("fx".into()).is_caller_error());
        assert!(Error::InvalidIterationCount { got: 50, min: 100, max: 100_000 }.is_caller_error());
        assert!(!Error::RateLimited { source_key: "newsapi".into() }.is_caller_error());
        assert!(!Error::unavailable("bls", "down").is_caller_error());
    }

    #[test]
    fn test_iteration_error_message() {
        let e = Error::InvalidIterationCount { got: 50, min: 100, max: 100_000 };
        assert_eq!(e.to_string(), "Invalid iteration count 50: must be within [100, 100000]");
    }
}
