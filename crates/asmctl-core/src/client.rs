//! Collaborator contract
//!
//! The management API client is owned by the caller: it handles
//! authentication, TLS, and rendering requests to the wire format. The core
//! only needs it to issue mutating requests, report operation status, and
//! read observable resource state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::operation::{OperationId, OperationStatus};

/// Error returned by the collaborator for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection, TLS or decoding failure; no response from the backend
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend responded with an error status
    #[error("HTTP {status} {code}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },
}

impl ApiError {
    pub fn http(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(_) => None,
        }
    }

    /// Returns true if the backend reported a missing resource (404)
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if the backend rejected the call as conflicting (409)
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Returns true for 5xx responses
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Returns true if a caller could reasonably try the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
        }
    }
}

/// HTTP verb of a mutating request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Description of one mutating call
///
/// The payload is a structured value; the collaborator renders it to
/// whatever the management endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescription {
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl RequestDescription {
    pub fn post(path: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            payload: Some(payload),
        }
    }

    pub fn put(path: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            payload: Some(payload),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            payload: None,
        }
    }
}

/// Management API client as seen by the await loop
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Issue one mutating call; the backend answers with an operation handle
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError>;

    /// Read the current status of a previously submitted operation
    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError>;
}

/// Fresh reads of a resource's observable state, keyed by `K`
#[async_trait]
pub trait StateSource<K, S>: Send + Sync
where
    K: Send + Sync,
{
    async fn fetch_state(&self, key: &K) -> Result<S, ApiError>;
}

#[async_trait]
impl<T: ManagementClient + ?Sized> ManagementClient for &T {
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError> {
        (**self).submit(request).await
    }

    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError> {
        (**self).operation_status(id).await
    }
}

#[async_trait]
impl<T: ManagementClient + ?Sized> ManagementClient for Arc<T> {
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError> {
        (**self).submit(request).await
    }

    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError> {
        (**self).operation_status(id).await
    }
}

#[async_trait]
impl<K, S, T> StateSource<K, S> for Arc<T>
where
    K: Send + Sync,
    T: StateSource<K, S> + ?Sized,
{
    async fn fetch_state(&self, key: &K) -> Result<S, ApiError> {
        (**self).fetch_state(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_predicates() {
        let not_found = ApiError::http(404, "ResourceNotFound", "no such service");
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        let conflict = ApiError::http(409, "ConflictError", "busy");
        assert!(conflict.is_conflict());

        let unavailable = ApiError::http(503, "ServiceUnavailable", "try later");
        assert!(unavailable.is_server_error());
        assert!(unavailable.is_retryable());

        let transport = ApiError::Transport("connection reset".to_string());
        assert!(transport.status().is_none());
        assert!(transport.is_retryable());
    }

    #[test]
    fn test_request_description_constructors() {
        let req = RequestDescription::delete("services/hostedservices/x");
        assert_eq!(req.method, Method::Delete);
        assert!(req.payload.is_none());

        let req = RequestDescription::post("services/storageservices", serde_json::json!({}));
        assert_eq!(req.method.to_string(), "POST");
        assert!(req.payload.is_some());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::http(400, "BadRequest", "invalid label");
        assert_eq!(err.to_string(), "HTTP 400 BadRequest: invalid label");
    }
}
