//! Error types for the harvesting engine.
//!
//! Every failure the engine can observe is classified into one of four
//! classes (see [`FailureClass`]). The harvest loop decides what to do with a
//! failure by its class alone: soft failures are retried, hard failures
//! abandon the current partition, a session abort unwinds the partition, and
//! only fatal errors reach the caller of a harvest.

use std::time::Duration;
use thiserror::Error;

/// How the harvest loop must react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient transport failure; the same query may succeed if retried.
    Soft,
    /// The request was processed and rejected; retrying will not help.
    Hard,
    /// The backoff controller gave up on the endpoint for now.
    Abort,
    /// Unrecoverable for the whole harvest.
    Fatal,
}

/// The main error type for harvest operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The request did not complete within the configured timeout.
    #[error("request to '{endpoint}' timed out after {elapsed:?}")]
    Timeout {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Configured timeout that elapsed.
        elapsed: Duration,
    },

    /// The connection could not be established or was dropped.
    #[error("connection to '{endpoint}' failed: {message}")]
    ConnectionFailed {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Transport error message.
        message: String,
    },

    /// The endpoint answered with HTTP 429.
    #[error("rate limited by '{endpoint}' (retry after {retry_after:?})")]
    RateLimited {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Value of the `Retry-After` header, if one was sent.
        retry_after: Option<Duration>,
    },

    /// The endpoint answered with a 5xx status.
    #[error("server error from '{endpoint}': HTTP {status}")]
    ServerError {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The endpoint answered with a non-200 status that is neither 429 nor 5xx.
    #[error("unexpected status from '{endpoint}': HTTP {status}")]
    UnexpectedStatus {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// HTTP 200 carrying an application-level error envelope.
    #[error("query rejected by '{endpoint}': {details}")]
    Rejected {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Serialized error envelope.
        details: String,
    },

    /// HTTP 200 whose body could not be interpreted.
    #[error("malformed response from '{endpoint}': {details}")]
    MalformedResponse {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// What was wrong with the body.
        details: String,
    },

    /// Too many consecutive queries failed; the session circuit is open.
    #[error("session aborted after {consecutive_failures} consecutive failed queries: {last_error}")]
    SessionAbort {
        /// Consecutive failed queries when the circuit opened.
        consecutive_failures: u32,
        /// Description of the failure that tripped (or kept) the circuit open.
        last_error: String,
    },

    /// Persisting or reading harvest output failed.
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl HarvestError {
    /// Returns the failure class of this error.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::UnexpectedStatus { .. } => FailureClass::Soft,
            Self::Rejected { .. } | Self::MalformedResponse { .. } => FailureClass::Hard,
            Self::SessionAbort { .. } => FailureClass::Abort,
            Self::Output(_) | Self::Configuration { .. } => FailureClass::Fatal,
        }
    }

    /// Returns `true` if the same query may be retried.
    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Soft
    }

    /// Returns `true` if this error is a session abort signal.
    pub fn is_session_abort(&self) -> bool {
        self.class() == FailureClass::Abort
    }

    /// Returns the endpoint name if this error is associated with one.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Timeout { endpoint, .. }
            | Self::ConnectionFailed { endpoint, .. }
            | Self::RateLimited { endpoint, .. }
            | Self::ServerError { endpoint, .. }
            | Self::UnexpectedStatus { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::MalformedResponse { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Classifies a non-200 HTTP status as the matching soft failure.
    pub fn from_status(endpoint: impl Into<String>, status: u16) -> Self {
        let endpoint = endpoint.into();
        match status {
            429 => Self::RateLimited {
                endpoint,
                retry_after: None,
            },
            500..=599 => Self::ServerError { endpoint, status },
            _ => Self::UnexpectedStatus { endpoint, status },
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(endpoint: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            elapsed,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a `Rejected` error.
    pub fn rejected(endpoint: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Rejected {
            endpoint: endpoint.into(),
            details: details.into(),
        }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(endpoint: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            details: details.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Why a raw node could not become an [`EntityRecord`](crate::core::EntityRecord).
///
/// Parse failures are logged and the node is skipped; they never stop a harvest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The node is not a JSON object.
    #[error("node is not an object")]
    NotAnObject,

    /// Neither `id` nor `legacyId` resolves to a numeric identity.
    #[error("node has no resolvable identifier")]
    MissingIdentifier,

    /// Both name fields are empty after trimming.
    #[error("node {numeric_id} has no first or last name")]
    MissingName {
        /// Numeric identity of the rejected node.
        numeric_id: u64,
    },
}

/// Error type for the output store.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writing records failed.
    #[error("failed to write records to {path}: {source}")]
    WriteFailed {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading records failed.
    #[error("failed to read records from {path}: {source}")]
    ReadFailed {
        /// Source path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize record {numeric_id}: {source}")]
    Serialize {
        /// Numeric identity of the record.
        numeric_id: u64,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A stored line is not a JSON object.
    #[error("line {line} of {path} is not a JSON object: {details}")]
    MalformedLine {
        /// Source path.
        path: String,
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        details: String,
    },
}

/// A specialized `Result` type for harvest operations.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// A specialized `Result` type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;
