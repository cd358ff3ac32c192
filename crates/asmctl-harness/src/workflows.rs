//! Multi-step provisioning workflows
//!
//! Each workflow composes submissions, the await loop and, where the
//! operation result says nothing about the resource, a convergence wait.

use asmctl_core::requests::{
    CaptureRole, CreateDeployment, DeleteHostedService, RestartRole, ShutdownRole, StartRole,
    UpdateRole, encode_label,
};
use asmctl_core::{
    CompletedOperation, DeploymentKey, DeploymentStatus, PowerState, ResourceStateSnapshot,
    RoleInstanceKey, WaitOptions, submit_and_wait, wait_for_deployment_status,
    wait_for_power_state,
};
use tracing::info;

use crate::catalog::{HostedServiceParams, ManagementApi, RoleInfo};
use crate::error::{HarnessError, Result};
use crate::logging::{tracing_progress, tracing_state};
use crate::role::RoleConfig;

/// Create a hosted service named after the role and deploy the role into it
///
/// The hosted service call completes synchronously; the deployment is
/// awaited. Returns the key of the single role instance.
pub async fn create_role_deployment<C>(
    client: &C,
    role: &RoleConfig,
    location: &str,
    options: &WaitOptions,
) -> Result<RoleInstanceKey>
where
    C: ManagementApi + ?Sized,
{
    let name = role.role_name.as_str();
    info!("Deploying VM: {}", name);

    client
        .create_hosted_service(&HostedServiceParams {
            service_name: name.to_string(),
            location: location.to_string(),
            label: encode_label(name),
        })
        .await
        .map_err(HarnessError::catalog("CreateHostedService"))?;

    deploy_role(client, name, role, options).await?;
    Ok(RoleInstanceKey::single_role(name))
}

/// Deploy a role into an existing hosted service and wait for the operation
pub async fn deploy_role<C>(
    client: &C,
    service: &str,
    role: &RoleConfig,
    options: &WaitOptions,
) -> Result<CompletedOperation>
where
    C: ManagementApi + ?Sized,
{
    let completed = submit_and_wait(
        client,
        &CreateDeployment::new(service, service, role.to_value()),
        options,
        Some(tracing_progress()),
    )
    .await?;
    Ok(completed)
}

/// Delete a hosted service with its disks and blobs
pub async fn delete_hosted_service<C>(client: &C, service: &str, options: &WaitOptions) -> Result<()>
where
    C: ManagementApi + ?Sized,
{
    info!("Deleting hosted service: {}", service);
    submit_and_wait(
        client,
        &DeleteHostedService::new(service, true),
        options,
        Some(tracing_progress()),
    )
    .await?;
    Ok(())
}

/// Re-read the deployment until it reports `Running`
pub async fn wait_for_running_deployment<C>(
    client: &C,
    key: &DeploymentKey,
    options: &WaitOptions,
) -> Result<ResourceStateSnapshot<DeploymentKey, DeploymentStatus>>
where
    C: ManagementApi + ?Sized,
{
    info!("Wait for deployment to enter running state");
    let snapshot = wait_for_deployment_status(
        client,
        key,
        DeploymentStatus::Running,
        options,
        Some(tracing_state()),
    )
    .await?;
    Ok(snapshot)
}

/// Shut a role down and wait until its instance reports `Stopped`
///
/// The shutdown operation can succeed before the instance is observed as
/// stopped, so both are awaited.
pub async fn shutdown_and_wait<C>(
    client: &C,
    key: &RoleInstanceKey,
    options: &WaitOptions,
) -> Result<ResourceStateSnapshot<RoleInstanceKey, PowerState>>
where
    C: ManagementApi + ?Sized,
{
    info!("Shutting down VM: {}", key.role);
    submit_and_wait(
        client,
        &ShutdownRole::new(key.clone()),
        options,
        Some(tracing_progress()),
    )
    .await?;

    let snapshot =
        wait_for_power_state(client, key, PowerState::Stopped, options, Some(tracing_state()))
            .await?;
    Ok(snapshot)
}

pub async fn start_role<C>(client: &C, key: &RoleInstanceKey, options: &WaitOptions) -> Result<()>
where
    C: ManagementApi + ?Sized,
{
    submit_and_wait(client, &StartRole::new(key.clone()), options, Some(tracing_progress()))
        .await?;
    Ok(())
}

pub async fn restart_role<C>(client: &C, key: &RoleInstanceKey, options: &WaitOptions) -> Result<()>
where
    C: ManagementApi + ?Sized,
{
    submit_and_wait(client, &RestartRole::new(key.clone()), options, Some(tracing_progress()))
        .await?;
    Ok(())
}

/// Capture a stopped role as a user image; the source deployment is removed
pub async fn capture_role<C>(
    client: &C,
    key: &RoleInstanceKey,
    image_name: &str,
    options: &WaitOptions,
) -> Result<()>
where
    C: ManagementApi + ?Sized,
{
    info!("Capturing image: {}", image_name);
    submit_and_wait(
        client,
        &CaptureRole::new(key.clone(), image_name, image_name),
        options,
        Some(tracing_progress()),
    )
    .await?;
    Ok(())
}

/// Apply a role update and read the role back
pub async fn update_role<C>(
    client: &C,
    key: &RoleInstanceKey,
    role: &RoleConfig,
    options: &WaitOptions,
) -> Result<RoleInfo>
where
    C: ManagementApi + ?Sized,
{
    submit_and_wait(
        client,
        &UpdateRole::new(key.clone(), role.to_value()),
        options,
        Some(tracing_progress()),
    )
    .await?;

    client
        .get_role(key)
        .await
        .map_err(HarnessError::catalog("GetRole"))
}
