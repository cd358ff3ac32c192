//! Synchronous reads and calls the scenarios need next to the LRO protocol

use asmctl_core::{
    ApiError, DeploymentKey, DeploymentStatus, ManagementClient, PowerState, RoleInstanceKey,
    StateSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::role::ExtensionReference;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccount {
    pub service_name: String,
    pub location: String,
}

impl StorageAccount {
    /// Blob URL for a VHD stored in this account
    pub fn blob_url(&self, container: &str, blob: &str) -> String {
        format!(
            "http://{}.blob.core.windows.net/{}/{}",
            self.service_name, container, blob
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsImage {
    pub name: String,
    pub label: String,
    /// `Public` for platform images, `User` for captured ones
    pub category: String,
    pub image_family: String,
    pub published_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmImage {
    pub name: String,
    pub category: String,
    pub description: String,
    pub published_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedServiceParams {
    pub service_name: String,
    pub location: String,
    /// Base64 encoded label
    pub label: String,
}

/// Current definition of a deployed role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role_name: String,
    pub extensions: Vec<ExtensionReference>,
}

impl RoleInfo {
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .map(|e| e.reference_name.as_str())
            .collect()
    }
}

/// Non-LRO endpoints of the management API
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>, ApiError>;

    async fn get_storage_account(&self, name: &str) -> Result<StorageAccount, ApiError>;

    async fn list_locations(&self) -> Result<Vec<Location>, ApiError>;

    async fn list_os_images(&self) -> Result<Vec<OsImage>, ApiError>;

    async fn list_vm_images(&self) -> Result<Vec<VmImage>, ApiError>;

    /// Completes synchronously; no operation handle is issued
    async fn create_hosted_service(&self, params: &HostedServiceParams) -> Result<(), ApiError>;

    async fn get_role(&self, key: &RoleInstanceKey) -> Result<RoleInfo, ApiError>;
}

#[async_trait]
impl<T: ServiceCatalog + ?Sized> ServiceCatalog for Arc<T> {
    async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>, ApiError> {
        (**self).list_storage_accounts().await
    }

    async fn get_storage_account(&self, name: &str) -> Result<StorageAccount, ApiError> {
        (**self).get_storage_account(name).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, ApiError> {
        (**self).list_locations().await
    }

    async fn list_os_images(&self) -> Result<Vec<OsImage>, ApiError> {
        (**self).list_os_images().await
    }

    async fn list_vm_images(&self) -> Result<Vec<VmImage>, ApiError> {
        (**self).list_vm_images().await
    }

    async fn create_hosted_service(&self, params: &HostedServiceParams) -> Result<(), ApiError> {
        (**self).create_hosted_service(params).await
    }

    async fn get_role(&self, key: &RoleInstanceKey) -> Result<RoleInfo, ApiError> {
        (**self).get_role(key).await
    }
}

/// Everything a provisioning scenario needs from the collaborator
pub trait ManagementApi:
    ManagementClient
    + ServiceCatalog
    + StateSource<RoleInstanceKey, PowerState>
    + StateSource<DeploymentKey, DeploymentStatus>
{
}

impl<T> ManagementApi for T where
    T: ManagementClient
        + ServiceCatalog
        + StateSource<RoleInstanceKey, PowerState>
        + StateSource<DeploymentKey, DeploymentStatus>
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_url() {
        let account = StorageAccount {
            service_name: "sdkstore".to_string(),
            location: "West US".to_string(),
        };
        assert_eq!(
            account.blob_url("sdktest", "vm.vhd"),
            "http://sdkstore.blob.core.windows.net/sdktest/vm.vhd"
        );
    }
}
