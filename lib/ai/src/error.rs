//! Error types for the AI crate.

use std::fmt;

/// Errors from generation backends and the failover chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The request could not be sent or the connection failed.
    RequestFailed { backend: String, reason: String },
    /// The backend answered with a non-success status.
    Status {
        backend: String,
        status: u16,
        body: String,
    },
    /// The backend asked us to slow down.
    RateLimited {
        backend: String,
        retry_after_secs: Option<u64>,
    },
    /// The backend did not answer in time.
    Timeout { backend: String },
    /// The response could not be understood.
    InvalidResponse { backend: String, reason: String },
    /// No backends are configured.
    NotConfigured,
    /// Every backend failed.
    Exhausted { attempts: u32, last_error: String },
}

impl GenerationError {
    /// Returns true when retrying the same backend may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidResponse { .. } | Self::NotConfigured | Self::Exhausted { .. } => false,
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { backend, reason } => {
                write!(f, "request to {backend} failed: {reason}")
            }
            Self::Status {
                backend,
                status,
                body,
            } => write!(f, "{backend} returned HTTP {status}: {body}"),
            Self::RateLimited {
                backend,
                retry_after_secs,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "{backend} rate limited, retry after {secs}s")
                } else {
                    write!(f, "{backend} rate limited")
                }
            }
            Self::Timeout { backend } => write!(f, "{backend} timed out"),
            Self::InvalidResponse { backend, reason } => {
                write!(f, "invalid response from {backend}: {reason}")
            }
            Self::NotConfigured => write!(f, "no generation backends configured"),
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "all generation backends failed after {attempts} attempt(s); last error: {last_error}"
            ),
        }
    }
}

impl std::error::Error for GenerationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = GenerationError::Status {
            backend: "primary".to_string(),
            status: 503,
            body: "overloaded".to_string(),
        };
        assert!(err.is_retryable());

        let err = GenerationError::Status {
            backend: "primary".to_string(),
            status: 400,
            body: "bad request".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limit_display() {
        let err = GenerationError::RateLimited {
            backend: "primary".to_string(),
            retry_after_secs: Some(3),
        };
        assert_eq!(err.to_string(), "primary rate limited, retry after 3s");
        assert!(err.is_retryable());
    }
}
