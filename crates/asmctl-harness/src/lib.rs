//! # asmctl-harness
//!
//! Provisioning scenarios built on the asmctl-core submit/await/converge
//! protocol: hosted services, deployments, role power operations, image
//! capture and VM extensions.
//!
//! The collaborator is anything implementing [`ManagementApi`]. Wrap a live
//! client in [`LoggingClient`] (or use [`Harness::logged`]) to trace every
//! request; use [`testing::FakeCloud`] to run the scenarios in memory.
//!
//! ```rust,ignore
//! use asmctl_harness::{Harness, scenarios, init_test_logging};
//!
//! init_test_logging();
//! let mut harness = Harness::logged(client);
//! scenarios::role_state_operations(&mut harness).await?;
//! ```

pub mod catalog;
pub mod context;
pub mod error;
pub mod images;
pub mod logging;
pub mod naming;
pub mod role;
pub mod scenarios;
pub mod storage;
pub mod testing;
pub mod workflows;

pub use catalog::{ManagementApi, ServiceCatalog, StorageAccount};
pub use context::{Harness, configured_wait, live_credentials};
pub use error::{HarnessError, Result};
pub use images::select_latest;
pub use logging::{LoggingClient, init_test_logging, tracing_progress, tracing_state};
pub use naming::NameGenerator;
pub use role::RoleConfig;
pub use storage::acquire_storage_account;
