//! Provisioning scenarios run end to end against the in-memory backend

use std::time::Duration;

use asmctl_core::requests::ShutdownRole;
use asmctl_core::{OperationError, WaitOptions, submit_and_wait};
use asmctl_harness::catalog::ServiceCatalog;
use asmctl_harness::testing::FakeCloud;
use asmctl_harness::workflows::{capture_role, create_role_deployment, shutdown_and_wait};
use asmctl_harness::{
    Harness, HarnessError, LoggingClient, NameGenerator, RoleConfig, acquire_storage_account,
    init_test_logging, scenarios,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;

fn harness(cloud: FakeCloud) -> Harness<FakeCloud, StdRng> {
    init_test_logging();
    Harness::new(cloud, NameGenerator::seeded(2015), WaitOptions::default())
}

fn with_account() -> FakeCloud {
    FakeCloud::new().with_storage_account("sdkstore", "West US")
}

fn deploy(service: &str) -> String {
    format!("POST services/hostedservices/{service}/deployments")
}

fn delete(service: &str) -> String {
    format!("DELETE services/hostedservices/{service}?comp=media")
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn deploy_platform_image_uses_newest_ubuntu_and_cleans_up() {
    let mut h = harness(with_account());

    scenarios::deploy_platform_image(&mut h).await.unwrap();

    let cloud = h.client();
    assert!(cloud.hosted_services().is_empty());

    let submitted = cloud.submitted();
    assert_eq!(submitted.len(), 2);
    let role = &submitted[0].payload.as_ref().unwrap()["RoleList"][0];
    assert_eq!(role["Image"]["SourceImageName"], "ubuntu-14_04-201503");
    assert_eq!(
        role["Image"]["MediaLink"],
        format!(
            "http://sdkstore.blob.core.windows.net/sdktest/{}.vhd",
            role["RoleName"].as_str().unwrap()
        )
    );
    assert_eq!(role["InputEndpoints"][0]["Port"], 22);
}

#[tokio::test(start_paused = true)]
async fn deploy_capture_redeploy_builds_from_user_image() {
    let mut h = harness(with_account());

    scenarios::deploy_capture_redeploy(&mut h).await.unwrap();

    let cloud = h.client();
    let images = cloud.user_images();
    assert_eq!(images.len(), 1);
    assert!(cloud.hosted_services().is_empty());

    let submitted = cloud.submitted();
    let service = submitted[0].path.split('/').nth(2).unwrap().to_string();
    assert_eq!(
        cloud.submitted_operations(),
        vec![
            deploy(&service),
            "ShutdownRoleOperation".to_string(),
            "CaptureRoleOperation".to_string(),
            deploy(&service),
            delete(&service),
        ]
    );

    let redeployed = &submitted[3].payload.as_ref().unwrap()["RoleList"][0];
    assert_eq!(redeployed["Image"]["SourceImageName"], images[0].name.as_str());
    assert_ne!(redeployed["RoleName"], service.as_str());
}

#[tokio::test(start_paused = true)]
async fn role_state_operations_run_in_order() {
    let mut h = harness(with_account());

    scenarios::role_state_operations(&mut h).await.unwrap();

    let ops = h.client().submitted_operations();
    assert_eq!(ops.len(), 5);
    assert_eq!(
        ops[1..4].to_vec(),
        vec![
            "ShutdownRoleOperation".to_string(),
            "StartRoleOperation".to_string(),
            "RestartRoleOperation".to_string(),
        ]
    );
    assert!(ops[4].starts_with("DELETE"));
}

#[tokio::test(start_paused = true)]
async fn update_role_extensions_swaps_cs_for_osp() {
    let mut h = harness(with_account());

    scenarios::update_role_extensions(&mut h).await.unwrap();

    let submitted = h.client().submitted();
    let deployed = &submitted[0].payload.as_ref().unwrap()["RoleList"][0];
    assert_eq!(
        deployed["ResourceExtensionReferences"][0]["ReferenceName"],
        "cs"
    );
    // The middle update carries no extension references at all
    assert_eq!(submitted[1].payload, Some(serde_json::json!({})));
}

#[tokio::test(start_paused = true)]
async fn deploy_from_vm_image_uses_windows_provisioning() {
    let mut h = harness(with_account());

    scenarios::deploy_from_vm_image(&mut h).await.unwrap();

    let submitted = h.client().submitted();
    let role = &submitted[0].payload.as_ref().unwrap()["RoleList"][0];
    assert_eq!(role["Image"]["Kind"], "VmImage");
    assert_eq!(role["Image"]["VMImageName"], scenarios::SQL_SERVER_VM_IMAGE);
    assert_eq!(
        role["Provisioning"]["ConfigurationSetType"],
        "WindowsProvisioningConfiguration"
    );
    assert!(h.client().hosted_services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn vm_image_listing_counts_images() {
    let mut h = harness(FakeCloud::new());
    assert_eq!(scenarios::list_vm_images(&mut h).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenarios_run_through_the_logging_client() {
    init_test_logging();
    let mut h = Harness::new(
        LoggingClient::new(with_account()),
        NameGenerator::seeded(7),
        WaitOptions::default(),
    );

    scenarios::deploy_platform_image(&mut h).await.unwrap();
    assert_eq!(h.client().inner().submitted().len(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn failed_operation_is_reported_and_service_still_deleted() {
    let cloud = with_account().fail_operations_matching(
        "StartRoleOperation",
        OperationError::new("Conflict", "role is busy").with_http_status(409),
    );
    let mut h = harness(cloud);

    let err = scenarios::role_state_operations(&mut h).await.unwrap_err();

    let core = err.core().expect("core error");
    assert_eq!(core.operation_error().map(|e| e.code.as_str()), Some("Conflict"));
    assert!(core.is_conflict());

    // Restart never ran; the cleanup delete did
    let ops = h.client().submitted_operations();
    assert!(!ops.iter().any(|op| op == "RestartRoleOperation"));
    assert!(ops.last().unwrap().starts_with("DELETE"));
    assert!(h.client().hosted_services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_operations_hit_the_poll_limit() {
    let cloud = with_account().operation_polls(1000);
    let mut h = harness(cloud).with_wait(WaitOptions::with_max_polls(Duration::from_secs(5), 4));

    let err = scenarios::deploy_platform_image(&mut h).await.unwrap_err();
    assert!(err.core().is_some_and(|e| e.is_timeout()));
}

#[tokio::test(start_paused = true)]
async fn capture_without_convergence_is_rejected() {
    init_test_logging();
    let cloud = with_account();
    let options = WaitOptions::default();
    let role = RoleConfig::new("sdkcapture", "Standard_D3");

    let key = create_role_deployment(&cloud, &role, "West US", &options)
        .await
        .unwrap();

    // The shutdown operation finishes before the instance reports Stopped
    submit_and_wait(&cloud, &ShutdownRole::new(key.clone()), &options, None)
        .await
        .unwrap();
    let err = capture_role(&cloud, &key, "sdkimage", &options)
        .await
        .unwrap_err();
    assert!(err.core().is_some_and(|e| e.is_submission() && e.is_conflict()));

    // Waiting for the power state first makes the capture valid
    let snapshot = shutdown_and_wait(&cloud, &key, &options).await.unwrap();
    assert_eq!(snapshot.state, asmctl_core::PowerState::Stopped);
    capture_role(&cloud, &key, "sdkimage", &options).await.unwrap();
    assert_eq!(cloud.user_images()[0].name, "sdkimage");
}

#[tokio::test(start_paused = true)]
async fn deploying_into_missing_service_fails_submission() {
    let cloud = with_account();
    let role = RoleConfig::new("sdkghost", "Standard_D3");

    let err = asmctl_harness::workflows::deploy_role(&cloud, "sdkghost", &role, &WaitOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(cloud.status_queries(), 0);
}

// ============================================================================
// Storage account acquisition
// ============================================================================

#[tokio::test(start_paused = true)]
async fn existing_storage_account_is_reused() {
    let mut h = harness(with_account());
    let account = acquire_storage_account(&mut h).await.unwrap();
    assert_eq!(account.service_name, "sdkstore");
    assert!(h.client().submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn storage_account_is_created_when_none_exist() {
    let mut h = harness(FakeCloud::new());

    let account = acquire_storage_account(&mut h).await.unwrap();

    assert!(account.service_name.starts_with("sdk"));
    assert!(["West US", "North Europe"].contains(&account.location.as_str()));
    assert_eq!(h.client().storage_accounts(), vec![account.clone()]);
    assert_eq!(
        h.client().submitted()[0].payload.as_ref().unwrap()["AccountType"],
        "Standard_LRS"
    );
    assert_eq!(
        h.client().get_storage_account(&account.service_name).await.unwrap(),
        account
    );
}

#[tokio::test(start_paused = true)]
async fn no_locations_means_no_storage_account() {
    let mut h = harness(FakeCloud::new().without_locations());
    let err = acquire_storage_account(&mut h).await.unwrap_err();
    assert!(matches!(err, HarnessError::NoLocations));
}

#[tokio::test(start_paused = true)]
async fn no_matching_image_fails_before_deploying() {
    let mut h = harness(with_account().with_os_images(Vec::new()));
    let err = scenarios::deploy_platform_image(&mut h).await.unwrap_err();
    assert!(matches!(err, HarnessError::NoMatchingImage { .. }));
    assert!(h.client().submitted().is_empty());
}
