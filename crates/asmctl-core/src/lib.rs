//! # asmctl-core
//!
//! Submit, await and converge for long-running management operations.
//!
//! A mutating call against the service management API does not finish when
//! the HTTP request returns. The backend hands back an operation handle and
//! the real work happens asynchronously. This crate provides the protocol
//! around that handle:
//!
//! 1. **Submission** - [`submit_and_wait`] takes a typed [`Submission`]
//!    (see [`requests`]), issues it through the caller's
//!    [`ManagementClient`], and fails fast with [`CoreError::Submission`]
//!    if no handle comes back.
//! 2. **Await** - [`wait_for_operation`] polls the handle until the backend
//!    reports success or failure, or the configured [`Deadline`] passes.
//! 3. **Convergence** - [`wait_for_state`] re-reads a resource until its
//!    observed state (for example a role's [`PowerState`]) matches a target.
//!    Operation-complete and resource-converged are separate steps.
//!
//! Every wait takes [`WaitOptions`]; the default is bounded, and unbounded
//! waits must be requested with [`Deadline::Unbounded`].
//!
//! The client itself (authentication, TLS, wire format) is supplied by the
//! caller. [`testing`] contains scripted clients for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod poller;
pub mod progress;
pub mod requests;
pub mod submit;
pub mod testing;
pub mod wait;

pub use client::{ApiError, ManagementClient, Method, RequestDescription, StateSource};
pub use error::{CoreError, Result};
pub use operation::{
    CompletedOperation, DeploymentKey, DeploymentStatus, OperationError, OperationId,
    OperationOutcome, OperationStatus, PowerState, ResourceStateSnapshot, RoleInstanceKey,
};
pub use poller::{
    StateCallback, StateEvent, wait_for_deployment_status, wait_for_power_state, wait_for_state,
};
pub use progress::{ProgressCallback, ProgressEvent, wait_for_operation};
pub use submit::{Submission, submit_and_wait, submit_only};
pub use wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, Deadline, WaitOptions};
