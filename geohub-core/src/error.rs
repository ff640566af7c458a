//! Error taxonomy shared by every Hub operation.

use std::time::Duration;

use thiserror::Error;

use crate::query::QueryError;

/// Errors produced while talking to the Hub.
///
/// Only rate-limit responses are retried, and only inside
/// [`Retrying`](crate::Retrying). Everything else is returned to the caller
/// as soon as it is observed.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HubError {
    /// A caller-supplied parameter was rejected before any request was sent.
    #[error(transparent)]
    Validation(#[from] QueryError),
    /// The server answered with a non-success status other than 429.
    #[error("request to {path} failed with status {status}: {body}")]
    Http {
        /// Request path relative to the base URL.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },
    /// Rate limiting persisted past the configured attempt budget.
    #[error("request to {path} still rate limited after {attempts} attempts ({waited:?} spent waiting)")]
    RetryExhausted {
        /// Request path relative to the base URL.
        path: String,
        /// Number of requests issued, including the first.
        attempts: u32,
        /// Total time slept between attempts.
        waited: Duration,
    },
    /// The response body was not JSON or did not have the expected shape.
    #[error("malformed response from {path}: {message}")]
    MalformedResponse {
        /// Request path relative to the base URL.
        path: String,
        /// Decoder message.
        message: String,
    },
    /// The request could not be delivered.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Transport message.
        message: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl HubError {
    /// HTTP status carried by the error, if any.
    ///
    /// Exhausted retries report 429, the status that kept being returned.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetryExhausted { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether the failure is an exhausted rate-limit budget.
    ///
    /// Callers may choose to retry these at a higher level.
    #[must_use]
    pub const fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}
