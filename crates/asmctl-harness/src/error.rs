//! Error types for the provisioning harness
//!
//! Wraps core protocol errors and adds the failures that only exist around
//! it: catalog reads, image selection and scenario verification.

use asmctl_core::config::ConfigError;
use asmctl_core::{ApiError, CoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// Submit, await or convergence failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A synchronous catalog call failed
    #[error("{request} failed: {source}")]
    Catalog {
        request: String,
        #[source]
        source: ApiError,
    },

    #[error("Filter too restrictive, no images left ({filter})")]
    NoMatchingImage { filter: String },

    #[error("No locations available for a new storage account")]
    NoLocations,

    #[error("Credentials unavailable: {0}")]
    Credentials(#[from] ConfigError),

    /// The resource did not look the way a scenario expected
    #[error("Verification failed: {0}")]
    Verification(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub(crate) fn catalog(request: impl Into<String>) -> impl FnOnce(ApiError) -> Self {
        let request = request.into();
        move |source| HarnessError::Catalog { request, source }
    }

    /// The wrapped core error, if any
    pub fn core(&self) -> Option<&CoreError> {
        match self {
            HarnessError::Core(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            HarnessError::Core(e) => e.is_not_found(),
            HarnessError::Catalog { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
