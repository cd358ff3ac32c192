//! End-to-end provisioning scenarios
//!
//! Every scenario deploys into a fresh hosted service named after its VM and
//! deletes that service (with media) before returning, whether or not the
//! steps in between succeeded. The first error wins.

use asmctl_core::WaitOptions;
use rand::Rng;
use tracing::info;

use crate::catalog::{ManagementApi, RoleInfo, StorageAccount};
use crate::context::Harness;
use crate::error::{HarnessError, Result};
use crate::images::{linux_test_image, user_image, vm_image};
use crate::role::RoleConfig;
use crate::storage::acquire_storage_account;
use crate::workflows::{
    capture_role, create_role_deployment, delete_hosted_service, deploy_role, restart_role,
    shutdown_and_wait, start_role, update_role, wait_for_running_deployment,
};

const VHD_CONTAINER: &str = "sdktest";
const LINUX_SIZE: &str = "Standard_D3";
const ADMIN_USER: &str = "azureuser";

/// SQL Server image used by [`deploy_from_vm_image`]
pub const SQL_SERVER_VM_IMAGE: &str =
    "fb83b3509582419d99629ce476bcb5c8__SQL-Server-2014-RTM-12.0.2430.0-OLTP-ENU-Win2012R2-cy14su11";

async fn cleanup<C>(client: &C, service: &str, options: &WaitOptions, outcome: Result<()>) -> Result<()>
where
    C: ManagementApi + ?Sized,
{
    let deleted = delete_hosted_service(client, service, options).await;
    outcome.and(deleted)
}

fn expect_single_extension(role: &RoleInfo, reference_name: &str) -> Result<()> {
    match role.extension_names().as_slice() {
        [only] if *only == reference_name => Ok(()),
        names => Err(HarnessError::Verification(format!(
            "expected role {} to have only extension '{}', found {:?}",
            role.role_name, reference_name, names
        ))),
    }
}

/// Linux VM from the newest public Ubuntu image, SSH open
async fn linux_platform_role<C, R>(
    harness: &mut Harness<C, R>,
    vm_name: &str,
    storage: &StorageAccount,
    host_name: &str,
) -> Result<RoleConfig>
where
    C: ManagementApi,
    R: Rng,
{
    let image = linux_test_image(harness.client()).await?;
    let disk_label = harness.name();
    let password = harness.password();
    Ok(RoleConfig::new(vm_name, LINUX_SIZE)
        .from_platform_image(
            image.name,
            storage.blob_url(VHD_CONTAINER, &format!("{vm_name}.vhd")),
            disk_label,
        )
        .for_linux(host_name, ADMIN_USER, password))
}

/// Deploy a Linux VM from a platform image, then delete it
pub async fn deploy_platform_image<C, R>(harness: &mut Harness<C, R>) -> Result<()>
where
    C: ManagementApi,
    R: Rng,
{
    let vm_name = harness.name();
    let storage = acquire_storage_account(harness).await?;
    let role = linux_platform_role(harness, &vm_name, &storage, "myvm")
        .await?
        .with_public_ssh();

    let outcome = create_role_deployment(harness.client(), &role, &storage.location, harness.wait())
        .await
        .map(|_| ());
    cleanup(harness.client(), &vm_name, harness.wait(), outcome).await
}

/// Deploy, stop, capture as a user image, and deploy a second VM from it
pub async fn deploy_capture_redeploy<C, R>(harness: &mut Harness<C, R>) -> Result<()>
where
    C: ManagementApi,
    R: Rng,
{
    let vm_name = harness.name();
    let storage = acquire_storage_account(harness).await?;
    let role = linux_platform_role(harness, &vm_name, &storage, "myvm")
        .await?
        .with_public_ssh();

    let image_name = harness.name();
    let new_vm_name = harness.name();
    let new_disk_label = harness.name();
    let new_password = harness.password();

    let outcome = async {
        let key =
            create_role_deployment(harness.client(), &role, &storage.location, harness.wait())
                .await?;
        wait_for_running_deployment(harness.client(), &key.deployment_key(), harness.wait())
            .await?;
        shutdown_and_wait(harness.client(), &key, harness.wait()).await?;
        capture_role(harness.client(), &key, &image_name, harness.wait()).await?;

        let image = user_image(harness.client(), &image_name).await?;
        info!("Found image: {:?}", image);

        let new_role = RoleConfig::new(&new_vm_name, LINUX_SIZE)
            .from_platform_image(
                &image.name,
                storage.blob_url(VHD_CONTAINER, &format!("{new_vm_name}.vhd")),
                new_disk_label,
            )
            .for_linux(&new_vm_name, ADMIN_USER, new_password)
            .with_public_ssh();

        info!("Deploying new VM from freshly captured image: {}", new_vm_name);
        deploy_role(harness.client(), &vm_name, &new_role, harness.wait()).await?;
        Ok::<(), HarnessError>(())
    }
    .await;

    cleanup(harness.client(), &vm_name, harness.wait(), outcome).await
}

/// Shut down, start and restart a role, each awaited
pub async fn role_state_operations<C, R>(harness: &mut Harness<C, R>) -> Result<()>
where
    C: ManagementApi,
    R: Rng,
{
    let vm_name = harness.name();
    let storage = acquire_storage_account(harness).await?;
    let role = linux_platform_role(harness, &vm_name, &storage, "myvm").await?;

    let outcome = async {
        let key =
            create_role_deployment(harness.client(), &role, &storage.location, harness.wait())
                .await?;
        shutdown_and_wait(harness.client(), &key, harness.wait()).await?;
        start_role(harness.client(), &key, harness.wait()).await?;
        restart_role(harness.client(), &key, harness.wait()).await?;
        Ok::<(), HarnessError>(())
    }
    .await;

    cleanup(harness.client(), &vm_name, harness.wait(), outcome).await
}

/// Install, keep, then swap VM extensions through role updates
///
/// An update without extension references leaves the installed set alone;
/// an update listing `cs` as uninstalled and `osp` as enabled leaves only
/// `osp`.
pub async fn update_role_extensions<C, R>(harness: &mut Harness<C, R>) -> Result<()>
where
    C: ManagementApi,
    R: Rng,
{
    let vm_name = harness.name();
    let storage = acquire_storage_account(harness).await?;
    let command = serde_json::json!({ "commandToExecute": "touch /tmp/hello" }).to_string();
    let role = linux_platform_role(harness, &vm_name, &storage, "myvm")
        .await?
        .with_extension(
            "CustomScriptForLinux",
            "Microsoft.OSTCExtensions",
            "1.2",
            "cs",
            "enable",
            Some(command.as_bytes()),
            None,
        );

    let outcome = async {
        let key =
            create_role_deployment(harness.client(), &role, &storage.location, harness.wait())
                .await?;

        let deployed = harness
            .client()
            .get_role(&key)
            .await
            .map_err(HarnessError::catalog("GetRole"))?;
        expect_single_extension(&deployed, "cs")?;

        let unchanged =
            update_role(harness.client(), &key, &RoleConfig::default(), harness.wait()).await?;
        expect_single_extension(&unchanged, "cs")?;

        let swap = RoleConfig::default()
            .with_extension(
                "CustomScriptForLinux",
                "Microsoft.OSTCExtensions",
                "1.2",
                "cs",
                "uninstall",
                None,
                None,
            )
            .with_extension(
                "OSPatchingForLinux",
                "Microsoft.OSTCExtensions",
                "1.0",
                "osp",
                "enable",
                None,
                None,
            );
        let swapped = update_role(harness.client(), &key, &swap, harness.wait()).await?;
        expect_single_extension(&swapped, "osp")
    }
    .await;

    cleanup(harness.client(), &vm_name, harness.wait(), outcome).await
}

/// Deploy a Windows VM from the SQL Server VM image, then delete it
pub async fn deploy_from_vm_image<C, R>(harness: &mut Harness<C, R>) -> Result<()>
where
    C: ManagementApi,
    R: Rng,
{
    let vm_name = harness.name();
    let storage = acquire_storage_account(harness).await?;
    let image = vm_image(harness.client(), SQL_SERVER_VM_IMAGE, |im| {
        im.name == SQL_SERVER_VM_IMAGE
    })
    .await?;

    let password = harness.password();
    let role = RoleConfig::new(&vm_name, "Standard_D4")
        .from_vm_image(
            image.name,
            format!(
                "http://{}.blob.core.windows.net/{}",
                storage.service_name, vm_name
            ),
            false,
        )
        .for_windows(&vm_name, ADMIN_USER, password, true, "")
        .with_public_ssh();

    let outcome = create_role_deployment(harness.client(), &role, &storage.location, harness.wait())
        .await
        .map(|_| ());
    cleanup(harness.client(), &vm_name, harness.wait(), outcome).await
}

/// Log every VM image the subscription can see
pub async fn list_vm_images<C, R>(harness: &mut Harness<C, R>) -> Result<usize>
where
    C: ManagementApi,
    R: Rng,
{
    let images = harness
        .client()
        .list_vm_images()
        .await
        .map_err(HarnessError::catalog("ListVirtualMachineImages"))?;
    for image in &images {
        info!("{} - {}", image.name, image.description);
    }
    Ok(images.len())
}
