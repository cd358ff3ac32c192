//! Typed mutating endpoints
//!
//! Each type describes one management call that answers with an operation
//! handle. Payloads are structured values; role and deployment bodies are
//! passed through from the caller untouched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use crate::client::RequestDescription;
use crate::operation::RoleInstanceKey;
use crate::submit::Submission;

fn role_operations_path(key: &RoleInstanceKey) -> String {
    format!(
        "services/hostedservices/{}/deployments/{}/roleinstances/{}/Operations",
        key.service, key.deployment, key.role
    )
}

/// Labels are sent base64 encoded
pub fn encode_label(label: &str) -> String {
    STANDARD.encode(label.as_bytes())
}

/// Redundancy tier of a storage account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAccountType {
    StandardLrs,
    StandardZrs,
    StandardGrs,
    StandardRagrs,
}

impl StorageAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageAccountType::StandardLrs => "Standard_LRS",
            StorageAccountType::StandardZrs => "Standard_ZRS",
            StorageAccountType::StandardGrs => "Standard_GRS",
            StorageAccountType::StandardRagrs => "Standard_RAGRS",
        }
    }
}

/// Create a storage account in a location
#[derive(Debug, Clone)]
pub struct CreateStorageAccount {
    pub name: String,
    pub location: String,
    pub account_type: StorageAccountType,
}

impl CreateStorageAccount {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            account_type: StorageAccountType::StandardLrs,
        }
    }

    pub fn account_type(mut self, account_type: StorageAccountType) -> Self {
        self.account_type = account_type;
        self
    }
}

impl Submission for CreateStorageAccount {
    fn request(&self) -> RequestDescription {
        RequestDescription::post(
            "services/storageservices",
            json!({
                "ServiceName": self.name,
                "Label": encode_label(&self.name),
                "Location": self.location,
                "AccountType": self.account_type.as_str(),
            }),
        )
    }

    fn describe(&self) -> String {
        format!("CreateStorageAccount {} in {}", self.name, self.location)
    }
}

/// Create a production deployment holding one role
#[derive(Debug, Clone)]
pub struct CreateDeployment {
    pub service: String,
    pub deployment: String,
    /// Role definition, rendered by the collaborator
    pub role: Value,
}

impl CreateDeployment {
    pub fn new(service: impl Into<String>, deployment: impl Into<String>, role: Value) -> Self {
        Self {
            service: service.into(),
            deployment: deployment.into(),
            role,
        }
    }
}

impl Submission for CreateDeployment {
    fn request(&self) -> RequestDescription {
        RequestDescription::post(
            format!("services/hostedservices/{}/deployments", self.service),
            json!({
                "Name": self.deployment,
                "DeploymentSlot": "Production",
                "Label": self.deployment,
                "RoleList": [self.role],
            }),
        )
    }

    fn describe(&self) -> String {
        format!("CreateDeployment {}/{}", self.service, self.deployment)
    }
}

/// Start a stopped role instance
#[derive(Debug, Clone)]
pub struct StartRole {
    pub key: RoleInstanceKey,
}

impl StartRole {
    pub fn new(key: RoleInstanceKey) -> Self {
        Self { key }
    }
}

impl Submission for StartRole {
    fn request(&self) -> RequestDescription {
        RequestDescription::post(
            role_operations_path(&self.key),
            json!({ "OperationType": "StartRoleOperation" }),
        )
    }

    fn describe(&self) -> String {
        format!("StartRole {}", self.key)
    }
}

/// What happens to a role's compute resources after shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostShutdownAction {
    Stopped,
    StoppedDeallocated,
}

/// Shut down a running role instance
#[derive(Debug, Clone)]
pub struct ShutdownRole {
    pub key: RoleInstanceKey,
    pub post_shutdown: PostShutdownAction,
}

impl ShutdownRole {
    pub fn new(key: RoleInstanceKey) -> Self {
        Self {
            key,
            post_shutdown: PostShutdownAction::Stopped,
        }
    }

    pub fn deallocate(mut self) -> Self {
        self.post_shutdown = PostShutdownAction::StoppedDeallocated;
        self
    }
}

impl Submission for ShutdownRole {
    fn request(&self) -> RequestDescription {
        let action = match self.post_shutdown {
            PostShutdownAction::Stopped => "Stopped",
            PostShutdownAction::StoppedDeallocated => "StoppedDeallocated",
        };
        RequestDescription::post(
            role_operations_path(&self.key),
            json!({
                "OperationType": "ShutdownRoleOperation",
                "PostShutdownAction": action,
            }),
        )
    }

    fn describe(&self) -> String {
        format!("ShutdownRole {}", self.key)
    }
}

/// Restart a role instance
#[derive(Debug, Clone)]
pub struct RestartRole {
    pub key: RoleInstanceKey,
}

impl RestartRole {
    pub fn new(key: RoleInstanceKey) -> Self {
        Self { key }
    }
}

impl Submission for RestartRole {
    fn request(&self) -> RequestDescription {
        RequestDescription::post(
            role_operations_path(&self.key),
            json!({ "OperationType": "RestartRoleOperation" }),
        )
    }

    fn describe(&self) -> String {
        format!("RestartRole {}", self.key)
    }
}

/// Capture a stopped role as a user OS image
///
/// The source deployment is deleted once the capture completes.
#[derive(Debug, Clone)]
pub struct CaptureRole {
    pub key: RoleInstanceKey,
    pub image_name: String,
    pub image_label: String,
}

impl CaptureRole {
    pub fn new(
        key: RoleInstanceKey,
        image_name: impl Into<String>,
        image_label: impl Into<String>,
    ) -> Self {
        Self {
            key,
            image_name: image_name.into(),
            image_label: image_label.into(),
        }
    }
}

impl Submission for CaptureRole {
    fn request(&self) -> RequestDescription {
        RequestDescription::post(
            role_operations_path(&self.key),
            json!({
                "OperationType": "CaptureRoleOperation",
                "PostCaptureAction": "Delete",
                "TargetImageName": self.image_name,
                "TargetImageLabel": self.image_label,
            }),
        )
    }

    fn describe(&self) -> String {
        format!("CaptureRole {} as {}", self.key, self.image_name)
    }
}

/// Replace a role's configuration
#[derive(Debug, Clone)]
pub struct UpdateRole {
    pub key: RoleInstanceKey,
    pub role: Value,
}

impl UpdateRole {
    pub fn new(key: RoleInstanceKey, role: Value) -> Self {
        Self { key, role }
    }
}

impl Submission for UpdateRole {
    fn request(&self) -> RequestDescription {
        RequestDescription::put(
            format!(
                "services/hostedservices/{}/deployments/{}/roles/{}",
                self.key.service, self.key.deployment, self.key.role
            ),
            self.role.clone(),
        )
    }

    fn describe(&self) -> String {
        format!("UpdateRole {}", self.key)
    }
}

/// Delete a hosted service, optionally with its disks and blobs
#[derive(Debug, Clone)]
pub struct DeleteHostedService {
    pub service: String,
    pub delete_media: bool,
}

impl DeleteHostedService {
    pub fn new(service: impl Into<String>, delete_media: bool) -> Self {
        Self {
            service: service.into(),
            delete_media,
        }
    }
}

impl Submission for DeleteHostedService {
    fn request(&self) -> RequestDescription {
        let mut path = format!("services/hostedservices/{}", self.service);
        if self.delete_media {
            path.push_str("?comp=media");
        }
        RequestDescription::delete(path)
    }

    fn describe(&self) -> String {
        format!("DeleteHostedService {}", self.service)
    }
}
