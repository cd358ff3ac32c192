//! Error taxonomy for submitting and awaiting long-running operations
//!
//! Submission failures, backend operation failures, poll read failures and
//! elapsed deadlines are distinct variants so callers can tell "the request
//! never produced a handle" apart from "the operation ran and failed".
//!
//! # Example
//!
//! ```rust
//! use asmctl_core::{ApiError, CoreError, OperationError, OperationId};
//!
//! let err = CoreError::OperationFailed {
//!     operation_id: OperationId::new("op-1"),
//!     error: OperationError::new("Conflict", "busy").with_http_status(409),
//! };
//! assert!(err.is_conflict());
//! assert!(!err.is_timeout());
//!
//! let err = CoreError::PollTransport {
//!     target: "op-1".to_string(),
//!     source: ApiError::Transport("connection reset".to_string()),
//! };
//! assert!(err.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::client::ApiError;
use crate::config::ConfigError;
use crate::operation::{OperationError, OperationId};

/// Core error type for the submit/await/converge protocol
#[derive(Error, Debug)]
pub enum CoreError {
    /// The mutating call failed before an operation handle was issued
    #[error("Failed to submit {request}: {source}")]
    Submission {
        request: String,
        #[source]
        source: ApiError,
    },

    /// The backend reported a terminal failure for a submitted operation
    #[error("Operation {operation_id} failed: {error}")]
    OperationFailed {
        operation_id: OperationId,
        error: OperationError,
    },

    /// A status or state read failed while polling
    #[error("Polling {target} failed: {source}")]
    PollTransport {
        target: String,
        #[source]
        source: ApiError,
    },

    /// The configured deadline elapsed before a terminal or target state
    #[error("Timed out waiting for {target} after {polls} polls ({waited:?})")]
    Timeout {
        target: String,
        waited: Duration,
        polls: u32,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns true if no operation handle was ever produced
    #[must_use]
    pub fn is_submission(&self) -> bool {
        matches!(self, CoreError::Submission { .. })
    }

    /// Returns true if this is a deadline error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout { .. })
    }

    /// Backend error payload of a failed operation
    #[must_use]
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            CoreError::OperationFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::Submission { source, .. } | CoreError::PollTransport { source, .. } => {
                source.is_not_found()
            }
            CoreError::OperationFailed { error, .. } => error.http_status == Some(404),
            _ => false,
        }
    }

    /// Returns true if this is a conflict error (409 or a `Conflict*` code)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            CoreError::Submission { source, .. } | CoreError::PollTransport { source, .. } => {
                source.is_conflict()
            }
            CoreError::OperationFailed { error, .. } => {
                error.http_status == Some(409) || error.code.starts_with("Conflict")
            }
            _ => false,
        }
    }

    /// Returns true if this error is potentially retryable by the caller
    ///
    /// Operation failures are backend-determined and never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Submission { source, .. } | CoreError::PollTransport { source, .. } => {
                source.is_retryable()
            }
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }
}
