//! Provider transport error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to a provider endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the provider endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// The provider endpoint did not respond within the configured timeout.
    #[error("request timeout after {duration_secs}s")]
    Timeout {
        duration_secs: u64,
    },

    /// Non-2xx HTTP response from the provider endpoint.
    #[error("API returned status {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The response body was not the JSON shape the provider documents.
    #[error("malformed provider response: {reason}")]
    MalformedResponse {
        reason: String,
    },

    /// Every model in the fallback list failed without recording an error.
    #[error("all models failed to provide guidance (tried: {})", attempted.join(", "))]
    AllModelsUnavailable {
        attempted: Vec<String>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl InferenceError {
    /// Whether a transport attempt that failed with this error may be retried.
    ///
    /// Network failures and timeouts are always retriable; HTTP errors only
    /// when their status is in `retryable_statuses`.
    pub fn is_retriable(&self, retryable_statuses: &[u16]) -> bool {
        match self {
            InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. } => true,
            InferenceError::HttpError { status, .. } => retryable_statuses.contains(status),
            _ => false,
        }
    }

    /// Map a `reqwest` send failure onto the transport taxonomy.
    pub(crate) fn from_send_error(err: &reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout {
                duration_secs: timeout_secs,
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
