//! Storage account for test VHDs

use asmctl_core::requests::CreateStorageAccount;
use asmctl_core::submit_and_wait;
use rand::Rng;
use tracing::info;

use crate::catalog::{ManagementApi, StorageAccount};
use crate::context::Harness;
use crate::error::{HarnessError, Result};
use crate::logging::tracing_progress;

/// Pick a random existing storage account, or create one
///
/// When the subscription has no accounts, a Standard_LRS account with a
/// generated name is created in a random location and read back once its
/// operation succeeds.
pub async fn acquire_storage_account<C, R>(harness: &mut Harness<C, R>) -> Result<StorageAccount>
where
    C: ManagementApi,
    R: Rng,
{
    info!("Retrieving storage account");
    let accounts = harness
        .client()
        .list_storage_accounts()
        .await
        .map_err(HarnessError::catalog("ListStorageServices"))?;

    let account = match harness.names().pick(&accounts) {
        Some(existing) => existing.clone(),
        None => create_storage_account(harness).await?,
    };

    info!(
        "Selected storage account '{}' in location '{}'",
        account.service_name, account.location
    );
    Ok(account)
}

async fn create_storage_account<C, R>(harness: &mut Harness<C, R>) -> Result<StorageAccount>
where
    C: ManagementApi,
    R: Rng,
{
    info!("No storage accounts found, creating a new one");
    let locations = harness
        .client()
        .list_locations()
        .await
        .map_err(HarnessError::catalog("ListLocations"))?;
    let location = harness
        .names()
        .pick(&locations)
        .map(|l| l.name.clone())
        .ok_or(HarnessError::NoLocations)?;

    info!("Location for new storage account: {}", location);
    let name = harness.name();
    submit_and_wait(
        harness.client(),
        &CreateStorageAccount::new(&name, &location),
        harness.wait(),
        Some(tracing_progress()),
    )
    .await?;

    harness
        .client()
        .get_storage_account(&name)
        .await
        .map_err(HarnessError::catalog("GetStorageService"))
}
