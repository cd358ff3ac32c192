//! Operation handles, statuses and observable resource states
//!
//! A mutating call against the management API returns an [`OperationId`].
//! Polling that id yields an [`OperationStatus`] until the backend reports a
//! terminal [`OperationOutcome`]. Resources whose convergence is not exposed
//! as an operation are observed through [`ResourceStateSnapshot`]s instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Opaque handle correlating a submitted request with its eventual outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Error payload reported by the backend for a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl OperationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Status returned by a single operation status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(OperationError),
}

impl OperationStatus {
    /// The terminal outcome, or `None` while the operation is still running
    pub fn outcome(&self) -> Option<OperationOutcome> {
        match self {
            OperationStatus::InProgress => None,
            OperationStatus::Succeeded => Some(OperationOutcome::Succeeded),
            OperationStatus::Failed(error) => Some(OperationOutcome::Failed(error.clone())),
        }
    }

    /// Build a status from the backend's textual status and optional error
    ///
    /// Unknown status strings are treated as still in progress; a `Failed`
    /// status without an error payload gets a generic one.
    pub fn from_parts(status: &str, error: Option<OperationError>) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed(error.unwrap_or_else(|| {
                OperationError::new("OperationFailed", "operation failed without error details")
            })),
            _ => OperationStatus::InProgress,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationStatus::InProgress => "InProgress",
            OperationStatus::Succeeded => "Succeeded",
            OperationStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed(OperationError),
}

/// A successfully awaited operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOperation {
    pub id: OperationId,
    /// Number of status queries issued, including the terminal one
    pub polls: u32,
    pub elapsed: Duration,
}

/// Point-in-time read of a resource's observable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStateSnapshot<K, S> {
    pub key: K,
    pub state: S,
    /// 1-based ordinal of the fetch that produced this snapshot
    pub fetch: u32,
}

/// Identifies a deployment inside a hosted service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentKey {
    pub service: String,
    pub deployment: String,
}

impl DeploymentKey {
    pub fn new(service: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            deployment: deployment.into(),
        }
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.deployment)
    }
}

/// Identifies a role instance inside a deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleInstanceKey {
    pub service: String,
    pub deployment: String,
    pub role: String,
}

impl RoleInstanceKey {
    pub fn new(
        service: impl Into<String>,
        deployment: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            deployment: deployment.into(),
            role: role.into(),
        }
    }

    /// Key for the common single-role layout where service, deployment and
    /// role all share the VM name
    pub fn single_role(name: &str) -> Self {
        Self::new(name, name, name)
    }

    pub fn deployment_key(&self) -> DeploymentKey {
        DeploymentKey::new(&self.service, &self.deployment)
    }
}

impl fmt::Display for RoleInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.deployment, self.role)
    }
}

/// Power state of a role instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown,
}

impl FromStr for PowerState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "starting" => PowerState::Starting,
            "started" | "running" => PowerState::Running,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" | "stoppeddeallocated" => PowerState::Deallocated,
            _ => PowerState::Unknown,
        })
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Starting => "Starting",
            PowerState::Running => "Running",
            PowerState::Stopping => "Stopping",
            PowerState::Stopped => "Stopped",
            PowerState::Deallocating => "Deallocating",
            PowerState::Deallocated => "Deallocated",
            PowerState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Status of a deployment as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Running,
    Suspended,
    RunningTransitioning,
    SuspendedTransitioning,
    Starting,
    Suspending,
    Deploying,
    Deleting,
    Unknown,
}

impl FromStr for DeploymentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "running" => DeploymentStatus::Running,
            "suspended" => DeploymentStatus::Suspended,
            "runningtransitioning" => DeploymentStatus::RunningTransitioning,
            "suspendedtransitioning" => DeploymentStatus::SuspendedTransitioning,
            "starting" => DeploymentStatus::Starting,
            "suspending" => DeploymentStatus::Suspending,
            "deploying" => DeploymentStatus::Deploying,
            "deleting" => DeploymentStatus::Deleting,
            _ => DeploymentStatus::Unknown,
        })
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_parts() {
        assert_eq!(
            OperationStatus::from_parts("InProgress", None),
            OperationStatus::InProgress
        );
        assert_eq!(
            OperationStatus::from_parts("succeeded", None),
            OperationStatus::Succeeded
        );

        let err = OperationError::new("Conflict", "busy").with_http_status(409);
        assert_eq!(
            OperationStatus::from_parts("Failed", Some(err.clone())),
            OperationStatus::Failed(err)
        );
    }

    #[test]
    fn test_failed_status_without_payload_gets_generic_error() {
        match OperationStatus::from_parts("FAILED", None) {
            OperationStatus::Failed(e) => assert_eq!(e.code, "OperationFailed"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_in_progress_has_no_outcome() {
        assert!(OperationStatus::InProgress.outcome().is_none());
        assert_eq!(
            OperationStatus::Succeeded.outcome(),
            Some(OperationOutcome::Succeeded)
        );
    }

    #[test]
    fn test_power_state_parsing() {
        assert_eq!("Started".parse::<PowerState>().unwrap(), PowerState::Running);
        assert_eq!("stopped".parse::<PowerState>().unwrap(), PowerState::Stopped);
        assert_eq!(
            "StoppedDeallocated".parse::<PowerState>().unwrap(),
            PowerState::Deallocated
        );
        assert_eq!("weird".parse::<PowerState>().unwrap(), PowerState::Unknown);
    }

    #[test]
    fn test_deployment_status_parsing() {
        assert_eq!(
            "RunningTransitioning".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::RunningTransitioning
        );
        assert_eq!(
            "Deploying".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::Deploying
        );
        assert_eq!(DeploymentStatus::Running.to_string(), "Running");
    }

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::new("Conflict", "Windows Azure is busy").with_http_status(409);
        assert_eq!(err.to_string(), "Conflict (409): Windows Azure is busy");
        assert_eq!(
            OperationError::new("BadRequest", "nope").to_string(),
            "BadRequest: nope"
        );
    }

    #[test]
    fn test_role_instance_key() {
        let key = RoleInstanceKey::single_role("sdkabc");
        assert_eq!(key.to_string(), "sdkabc/sdkabc/sdkabc");
        assert_eq!(key.deployment_key(), DeploymentKey::new("sdkabc", "sdkabc"));
    }
}
