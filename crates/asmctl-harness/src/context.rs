//! Shared state for a scenario run

use asmctl_core::config::{CERT_DATA_ENV, Config, Credentials, SUBSCRIPTION_ID_ENV};
use asmctl_core::{CoreError, WaitOptions};
use rand::Rng;
use rand::rngs::StdRng;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::ManagementApi;
use crate::error::Result;
use crate::logging::LoggingClient;
use crate::naming::NameGenerator;

/// Credentials for live runs, or `None` when the environment has none
///
/// Live scenarios skip instead of failing when this returns `None`. Malformed
/// certificate data is still an error.
pub fn live_credentials() -> Result<Option<Credentials>> {
    let credentials = Credentials::from_env()?;
    if credentials.is_none() {
        info!(
            "{} or {} not set, skipping live scenarios",
            SUBSCRIPTION_ID_ENV, CERT_DATA_ENV
        );
    }
    Ok(credentials)
}

/// Wait policy from the config file, or from one profile's `[wait]` table
///
/// Reads the standard config location when `path` is `None`. A missing file
/// yields the default bounded policy.
pub fn configured_wait(path: Option<&Path>, profile: Option<&str>) -> Result<WaitOptions> {
    let config = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .map_err(CoreError::from)?;

    let wait = config.wait_options(profile).map_err(CoreError::from)?;
    debug!("Wait policy: {:?}", wait);
    Ok(wait)
}

/// Client, name source and wait policy used by one scenario
pub struct Harness<C, R = StdRng> {
    client: C,
    names: NameGenerator<R>,
    wait: WaitOptions,
}

impl<C: ManagementApi> Harness<LoggingClient<C>, StdRng> {
    /// Logged client, entropy-seeded names, default wait policy
    pub fn logged(client: C) -> Self {
        Harness::new(
            LoggingClient::new(client),
            NameGenerator::from_entropy(),
            WaitOptions::default(),
        )
    }
}

impl<C: ManagementApi, R: Rng> Harness<C, R> {
    pub fn new(client: C, names: NameGenerator<R>, wait: WaitOptions) -> Self {
        Self {
            client,
            names,
            wait,
        }
    }

    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn wait(&self) -> &WaitOptions {
        &self.wait
    }

    /// Fresh `sdk` prefixed resource name
    pub fn name(&mut self) -> String {
        self.names.name()
    }

    pub fn password(&mut self) -> String {
        self.names.password()
    }

    pub fn names(&mut self) -> &mut NameGenerator<R> {
        &mut self.names
    }
}
