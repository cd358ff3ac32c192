//! In-memory management backend for scenario tests
//!
//! [`FakeCloud`] interprets the same [`RequestDescription`]s a real client
//! would send, keeps hosted services, deployments, storage accounts and
//! images in memory, and answers operation status and resource state reads
//! the way the backend does: operations report `InProgress` for a few polls
//! before finishing, and role power state moves through transitional states
//! before settling.

use asmctl_core::{
    ApiError, DeploymentKey, DeploymentStatus, ManagementClient, Method, OperationError,
    OperationId, OperationStatus, PowerState, RequestDescription, RoleInstanceKey, StateSource,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::catalog::{
    HostedServiceParams, Location, OsImage, RoleInfo, ServiceCatalog, StorageAccount, VmImage,
};
use crate::images::LINUX_TEST_FAMILY;
use crate::role::{ExtensionReference, RoleConfig};
use crate::scenarios::SQL_SERVER_VM_IMAGE;

/// Reads of one observable value; the last one repeats
#[derive(Debug, Clone)]
struct Reads<S> {
    queue: VecDeque<S>,
}

impl<S: Clone> Reads<S> {
    fn new(states: impl IntoIterator<Item = S>) -> Self {
        Self {
            queue: states.into_iter().collect(),
        }
    }

    fn current(&self) -> Option<&S> {
        self.queue.front()
    }

    fn next(&mut self) -> Option<S> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }
}

#[derive(Debug)]
struct FakeDeployment {
    name: String,
    role_name: String,
    extensions: Vec<ExtensionReference>,
    status: Reads<DeploymentStatus>,
    power: Reads<PowerState>,
}

#[derive(Debug)]
struct FakeService {
    deployment: Option<FakeDeployment>,
}

#[derive(Debug, Clone)]
struct Failure {
    needle: String,
    error: OperationError,
}

#[derive(Debug, Default)]
struct CloudState {
    storage_accounts: Vec<StorageAccount>,
    locations: Vec<Location>,
    os_images: Vec<OsImage>,
    vm_images: Vec<VmImage>,
    services: BTreeMap<String, FakeService>,
    operations: HashMap<OperationId, Reads<OperationStatus>>,
    in_progress_polls: usize,
    failures: Vec<Failure>,
    submit_failures: VecDeque<ApiError>,
    submitted: Vec<RequestDescription>,
    status_queries: usize,
    next_id: u32,
}

/// In-memory stand-in for the management API
#[derive(Debug)]
pub struct FakeCloud {
    state: Mutex<CloudState>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: impl std::fmt::Display) -> ApiError {
    ApiError::http(404, "ResourceNotFound", format!("{what} was not found"))
}

fn conflict(message: impl Into<String>) -> ApiError {
    ApiError::http(409, "ConflictError", message)
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::http(400, "BadRequest", message)
}

fn published(year: i32, month: u32, day: u32) -> Option<chrono::DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

fn public_image(name: &str, family: &str, date: Option<chrono::DateTime<Utc>>) -> OsImage {
    OsImage {
        name: name.to_string(),
        label: name.to_string(),
        category: "Public".to_string(),
        image_family: family.to_string(),
        published_date: date,
    }
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, ApiError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request(format!("missing {field}")))
}

fn parse_role(value: &Value) -> Result<RoleConfig, ApiError> {
    serde_json::from_value(value.clone()).map_err(|e| bad_request(format!("invalid role: {e}")))
}

impl FakeCloud {
    /// Two locations, three dated Ubuntu images, one Windows image and the
    /// SQL Server VM image; no storage accounts or hosted services
    pub fn new() -> Self {
        let state = CloudState {
            locations: vec![
                Location {
                    name: "West US".to_string(),
                    display_name: "West US".to_string(),
                },
                Location {
                    name: "North Europe".to_string(),
                    display_name: "North Europe".to_string(),
                },
            ],
            os_images: vec![
                public_image("ubuntu-14_04-201501", LINUX_TEST_FAMILY, published(2015, 1, 10)),
                public_image("ubuntu-14_04-201503", LINUX_TEST_FAMILY, published(2015, 3, 2)),
                public_image("ubuntu-14_04-201502", LINUX_TEST_FAMILY, published(2015, 2, 5)),
                public_image("win2012r2-201504", "Windows Server 2012 R2", published(2015, 4, 1)),
            ],
            vm_images: vec![VmImage {
                name: SQL_SERVER_VM_IMAGE.to_string(),
                category: "Public".to_string(),
                description: "SQL Server 2014 RTM on Windows Server 2012 R2".to_string(),
                published_date: published(2014, 11, 20),
            }],
            in_progress_polls: 1,
            ..CloudState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_storage_account(self, name: &str, location: &str) -> Self {
        self.lock().storage_accounts.push(StorageAccount {
            service_name: name.to_string(),
            location: location.to_string(),
        });
        self
    }

    pub fn without_locations(self) -> Self {
        self.lock().locations.clear();
        self
    }

    pub fn with_os_images(self, images: Vec<OsImage>) -> Self {
        self.lock().os_images = images;
        self
    }

    /// Number of `InProgress` answers each operation gives before finishing
    pub fn operation_polls(self, in_progress: usize) -> Self {
        self.lock().in_progress_polls = in_progress;
        self
    }

    /// Operations whose path or `OperationType` contains `needle` fail with
    /// `error` and leave the resource untouched
    pub fn fail_operations_matching(self, needle: &str, error: OperationError) -> Self {
        self.lock().failures.push(Failure {
            needle: needle.to_string(),
            error,
        });
        self
    }

    /// The next submit is rejected without issuing a handle
    pub fn fail_next_submit(self, error: ApiError) -> Self {
        self.lock().submit_failures.push_back(error);
        self
    }

    /// Requests submitted so far, in order
    pub fn submitted(&self) -> Vec<RequestDescription> {
        self.lock().submitted.clone()
    }

    /// `OperationType` (or method and path) of each submitted request
    pub fn submitted_operations(&self) -> Vec<String> {
        self.lock()
            .submitted
            .iter()
            .map(|r| {
                r.payload
                    .as_ref()
                    .and_then(|p| p.get("OperationType"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} {}", r.method, r.path))
            })
            .collect()
    }

    pub fn status_queries(&self) -> usize {
        self.lock().status_queries
    }

    pub fn hosted_services(&self) -> Vec<String> {
        self.lock().services.keys().cloned().collect()
    }

    pub fn storage_accounts(&self) -> Vec<StorageAccount> {
        self.lock().storage_accounts.clone()
    }

    pub fn user_images(&self) -> Vec<OsImage> {
        self.lock()
            .os_images
            .iter()
            .filter(|im| im.category == "User")
            .cloned()
            .collect()
    }

    /// Name of the deployment's role, if the service has a deployment
    pub fn deployed_role(&self, service: &str) -> Option<String> {
        self.lock()
            .services
            .get(service)
            .and_then(|s| s.deployment.as_ref())
            .map(|d| d.role_name.clone())
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CloudState {
    fn failure_for(&self, request: &RequestDescription) -> Option<OperationError> {
        let operation_type = request
            .payload
            .as_ref()
            .and_then(|p| p.get("OperationType"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.failures
            .iter()
            .find(|f| request.path.contains(&f.needle) || operation_type.contains(&f.needle))
            .map(|f| f.error.clone())
    }

    fn deployment_mut(
        &mut self,
        service: &str,
        deployment: &str,
    ) -> Result<&mut FakeDeployment, ApiError> {
        self.services
            .get_mut(service)
            .ok_or_else(|| not_found(format!("hosted service {service}")))?
            .deployment
            .as_mut()
            .filter(|d| d.name == deployment)
            .ok_or_else(|| not_found(format!("deployment {service}/{deployment}")))
    }

    fn role_mut(&mut self, key: &RoleInstanceKey) -> Result<&mut FakeDeployment, ApiError> {
        let deployment = self.deployment_mut(&key.service, &key.deployment)?;
        if deployment.role_name != key.role {
            return Err(not_found(format!("role {key}")));
        }
        Ok(deployment)
    }

    /// Validate the request and apply its effect
    fn apply(&mut self, request: &RequestDescription) -> Result<(), ApiError> {
        let path = request.path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').collect();
        let empty = Value::Null;
        let payload = request.payload.as_ref().unwrap_or(&empty);

        match (request.method, segments.as_slice()) {
            (Method::Post, ["services", "storageservices"]) => {
                let name = payload_str(payload, "ServiceName")?;
                if self.storage_accounts.iter().any(|a| a.service_name == name) {
                    return Err(conflict(format!("storage account {name} exists")));
                }
                self.storage_accounts.push(StorageAccount {
                    service_name: name.to_string(),
                    location: payload_str(payload, "Location")?.to_string(),
                });
                Ok(())
            }
            (Method::Post, ["services", "hostedservices", service, "deployments"]) => {
                let name = payload_str(payload, "Name")?.to_string();
                let role = payload
                    .get("RoleList")
                    .and_then(|l| l.get(0))
                    .ok_or_else(|| bad_request("RoleList is empty"))
                    .and_then(parse_role)?;
                let hosted = self
                    .services
                    .get_mut(*service)
                    .ok_or_else(|| not_found(format!("hosted service {service}")))?;
                if hosted.deployment.is_some() {
                    return Err(conflict(format!("{service} already has a deployment")));
                }
                hosted.deployment = Some(FakeDeployment {
                    name,
                    role_name: role.role_name,
                    extensions: role.resource_extension_references,
                    status: Reads::new([DeploymentStatus::Deploying, DeploymentStatus::Running]),
                    power: Reads::new([PowerState::Starting, PowerState::Running]),
                });
                Ok(())
            }
            (
                Method::Post,
                ["services", "hostedservices", service, "deployments", deployment, "roleinstances", role, "Operations"],
            ) => {
                let key = RoleInstanceKey::new(*service, *deployment, *role);
                let operation_type = payload_str(payload, "OperationType")?;
                self.role_operation(&key, operation_type, payload)
            }
            (
                Method::Put,
                ["services", "hostedservices", service, "deployments", deployment, "roles", role],
            ) => {
                let update = parse_role(payload)?;
                let target = self.role_mut(&RoleInstanceKey::new(*service, *deployment, *role))?;
                if !update.resource_extension_references.is_empty() {
                    target.extensions = update
                        .resource_extension_references
                        .into_iter()
                        .filter(|e| !e.is_uninstall())
                        .collect();
                }
                Ok(())
            }
            (Method::Delete, ["services", "hostedservices", service]) => self
                .services
                .remove(*service)
                .map(|_| ())
                .ok_or_else(|| not_found(format!("hosted service {service}"))),
            _ => Err(bad_request(format!(
                "unsupported request {} {}",
                request.method, request.path
            ))),
        }
    }

    fn role_operation(
        &mut self,
        key: &RoleInstanceKey,
        operation_type: &str,
        payload: &Value,
    ) -> Result<(), ApiError> {
        let deployment = self.role_mut(key)?;
        match operation_type {
            "ShutdownRoleOperation" => {
                let settled = match payload.get("PostShutdownAction").and_then(Value::as_str) {
                    Some("StoppedDeallocated") => PowerState::Deallocated,
                    _ => PowerState::Stopped,
                };
                deployment.power = Reads::new([PowerState::Stopping, settled]);
                Ok(())
            }
            "StartRoleOperation" | "RestartRoleOperation" => {
                deployment.power = Reads::new([PowerState::Starting, PowerState::Running]);
                Ok(())
            }
            "CaptureRoleOperation" => {
                if deployment.power.current() != Some(&PowerState::Stopped) {
                    return Err(conflict(format!("role {key} must be stopped before capture")));
                }
                let image = OsImage {
                    name: payload_str(payload, "TargetImageName")?.to_string(),
                    label: payload_str(payload, "TargetImageLabel")?.to_string(),
                    category: "User".to_string(),
                    image_family: String::new(),
                    published_date: Some(Utc::now()),
                };
                self.os_images.push(image);
                if let Some(service) = self.services.get_mut(&key.service) {
                    service.deployment = None;
                }
                Ok(())
            }
            other => Err(bad_request(format!("unknown operation type {other}"))),
        }
    }
}

#[async_trait]
impl ManagementClient for FakeCloud {
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError> {
        let mut state = self.lock();
        state.submitted.push(request.clone());
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }

        let terminal = match state.failure_for(request) {
            Some(error) => OperationStatus::Failed(error),
            None => {
                state.apply(request)?;
                OperationStatus::Succeeded
            }
        };

        state.next_id += 1;
        let id = OperationId::new(format!("fake-op-{}", state.next_id));
        let mut statuses = vec![OperationStatus::InProgress; state.in_progress_polls];
        statuses.push(terminal);
        state.operations.insert(id.clone(), Reads::new(statuses));
        Ok(id)
    }

    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError> {
        let mut state = self.lock();
        state.status_queries += 1;
        state
            .operations
            .get_mut(id)
            .and_then(Reads::next)
            .ok_or_else(|| not_found(format!("operation {id}")))
    }
}

#[async_trait]
impl ServiceCatalog for FakeCloud {
    async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>, ApiError> {
        Ok(self.lock().storage_accounts.clone())
    }

    async fn get_storage_account(&self, name: &str) -> Result<StorageAccount, ApiError> {
        self.lock()
            .storage_accounts
            .iter()
            .find(|a| a.service_name == name)
            .cloned()
            .ok_or_else(|| not_found(format!("storage account {name}")))
    }

    async fn list_locations(&self) -> Result<Vec<Location>, ApiError> {
        Ok(self.lock().locations.clone())
    }

    async fn list_os_images(&self) -> Result<Vec<OsImage>, ApiError> {
        Ok(self.lock().os_images.clone())
    }

    async fn list_vm_images(&self) -> Result<Vec<VmImage>, ApiError> {
        Ok(self.lock().vm_images.clone())
    }

    async fn create_hosted_service(&self, params: &HostedServiceParams) -> Result<(), ApiError> {
        let mut state = self.lock();
        if state.services.contains_key(&params.service_name) {
            return Err(conflict(format!(
                "hosted service {} exists",
                params.service_name
            )));
        }
        state
            .services
            .insert(params.service_name.clone(), FakeService { deployment: None });
        Ok(())
    }

    async fn get_role(&self, key: &RoleInstanceKey) -> Result<RoleInfo, ApiError> {
        let mut state = self.lock();
        let deployment = state.role_mut(key)?;
        Ok(RoleInfo {
            role_name: deployment.role_name.clone(),
            extensions: deployment.extensions.clone(),
        })
    }
}

#[async_trait]
impl StateSource<RoleInstanceKey, PowerState> for FakeCloud {
    async fn fetch_state(&self, key: &RoleInstanceKey) -> Result<PowerState, ApiError> {
        let mut state = self.lock();
        let deployment = state.role_mut(key)?;
        Ok(deployment.power.next().unwrap_or(PowerState::Unknown))
    }
}

#[async_trait]
impl StateSource<DeploymentKey, DeploymentStatus> for FakeCloud {
    async fn fetch_state(&self, key: &DeploymentKey) -> Result<DeploymentStatus, ApiError> {
        let mut state = self.lock();
        let deployment = state.deployment_mut(&key.service, &key.deployment)?;
        Ok(deployment.status.next().unwrap_or(DeploymentStatus::Unknown))
    }
}
