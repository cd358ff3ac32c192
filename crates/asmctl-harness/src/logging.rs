//! Request logging and tracing setup
//!
//! [`LoggingClient`] wraps any management client and writes every call and
//! its outcome through `tracing`. The core crate never logs on its own; the
//! callbacks here turn its progress events into log lines.

use asmctl_core::{
    ApiError, DeploymentKey, DeploymentStatus, ManagementClient, OperationId, OperationStatus,
    PowerState, ProgressCallback, ProgressEvent, RequestDescription, RoleInstanceKey,
    StateCallback, StateEvent, StateSource,
};
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::catalog::{
    HostedServiceParams, Location, OsImage, RoleInfo, ServiceCatalog, StorageAccount, VmImage,
};

/// Longest payload or response body written to the log
pub const MAX_LOGGED_CHARS: usize = 5000;

const DEFAULT_FILTER: &str = "asmctl_harness=info,asmctl_core=info";

/// Truncate `s` to [`MAX_LOGGED_CHARS`] characters, marking the cut with `...`
pub fn chop(s: &str) -> String {
    match s.char_indices().nth(MAX_LOGGED_CHARS) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Install a compact subscriber that writes through the test harness
///
/// `RUST_LOG` wins when set. Safe to call from every test; only the first
/// call installs anything.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .try_init();
}

/// Progress callback that logs each await event
pub fn tracing_progress() -> ProgressCallback {
    Box::new(|event| match event {
        ProgressEvent::Started { operation_id } => {
            info!("Waiting for operation {}", operation_id);
        }
        ProgressEvent::Polling {
            operation_id,
            status,
            polls,
            elapsed,
        } => {
            debug!(
                "Operation {}: {} (poll {}, {:?})",
                operation_id, status, polls, elapsed
            );
        }
        ProgressEvent::Completed {
            operation_id,
            polls,
        } => {
            info!("Operation {} succeeded after {} polls", operation_id, polls);
        }
        ProgressEvent::Failed {
            operation_id,
            error,
        } => {
            info!("Operation {} failed: {}", operation_id, error);
        }
    })
}

/// State callback that logs each convergence read
pub fn tracing_state() -> StateCallback {
    Box::new(|event| match event {
        StateEvent::Observed {
            resource,
            observed,
            target,
            fetch,
            elapsed,
        } => {
            debug!(
                "{}: {} (want {}, read {}, {:?})",
                resource, observed, target, fetch, elapsed
            );
        }
        StateEvent::Converged { resource, fetches } => {
            info!("{} converged after {} reads", resource, fetches);
        }
    })
}

/// Management client that logs every request and response
#[derive(Debug, Clone)]
pub struct LoggingClient<C> {
    inner: C,
}

impl<C> LoggingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

fn log_read<T: Debug>(what: &str, result: &Result<T, ApiError>) {
    info!("AZURE> GET {}", what);
    match result {
        Ok(value) => debug!("   <<< {}", chop(&format!("{value:?}"))),
        Err(e) => info!("   <<< ERROR: {}", e),
    }
}

#[async_trait]
impl<C: ManagementClient> ManagementClient for LoggingClient<C> {
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError> {
        let result = self.inner.submit(request).await;

        info!("AZURE> {} {}", request.method, request.path);
        if let Some(payload) = &request.payload {
            info!("   >>> {}", chop(&payload.to_string()));
        }
        match &result {
            Ok(id) => info!("   <<< OperationID: {}", id),
            Err(e) => info!("   <<< ERROR: {}", e),
        }
        result
    }

    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError> {
        let result = self.inner.operation_status(id).await;
        match &result {
            Ok(status) => debug!("AZURE> GET operations/{} <<< {}", id, status),
            Err(e) => info!("AZURE> GET operations/{} <<< ERROR: {}", id, e),
        }
        result
    }
}

#[async_trait]
impl<C: ServiceCatalog> ServiceCatalog for LoggingClient<C> {
    async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>, ApiError> {
        let result = self.inner.list_storage_accounts().await;
        log_read("services/storageservices", &result);
        result
    }

    async fn get_storage_account(&self, name: &str) -> Result<StorageAccount, ApiError> {
        let result = self.inner.get_storage_account(name).await;
        log_read(&format!("services/storageservices/{name}"), &result);
        result
    }

    async fn list_locations(&self) -> Result<Vec<Location>, ApiError> {
        let result = self.inner.list_locations().await;
        log_read("locations", &result);
        result
    }

    async fn list_os_images(&self) -> Result<Vec<OsImage>, ApiError> {
        let result = self.inner.list_os_images().await;
        log_read("services/images", &result);
        result
    }

    async fn list_vm_images(&self) -> Result<Vec<VmImage>, ApiError> {
        let result = self.inner.list_vm_images().await;
        log_read("services/vmimages", &result);
        result
    }

    async fn create_hosted_service(&self, params: &HostedServiceParams) -> Result<(), ApiError> {
        let result = self.inner.create_hosted_service(params).await;
        info!("AZURE> POST services/hostedservices");
        info!("   >>> {:?}", params);
        if let Err(e) = &result {
            info!("   <<< ERROR: {}", e);
        }
        result
    }

    async fn get_role(&self, key: &RoleInstanceKey) -> Result<RoleInfo, ApiError> {
        let result = self.inner.get_role(key).await;
        log_read(
            &format!(
                "services/hostedservices/{}/deployments/{}/roles/{}",
                key.service, key.deployment, key.role
            ),
            &result,
        );
        result
    }
}

#[async_trait]
impl<C> StateSource<RoleInstanceKey, PowerState> for LoggingClient<C>
where
    C: StateSource<RoleInstanceKey, PowerState>,
{
    async fn fetch_state(&self, key: &RoleInstanceKey) -> Result<PowerState, ApiError> {
        let result = self.inner.fetch_state(key).await;
        log_read(&format!("power state of {key}"), &result);
        result
    }
}

#[async_trait]
impl<C> StateSource<DeploymentKey, DeploymentStatus> for LoggingClient<C>
where
    C: StateSource<DeploymentKey, DeploymentStatus>,
{
    async fn fetch_state(&self, key: &DeploymentKey) -> Result<DeploymentStatus, ApiError> {
        let result = self.inner.fetch_state(key).await;
        log_read(&format!("status of deployment {key}"), &result);
        result
    }
}
