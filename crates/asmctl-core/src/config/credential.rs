//! Credential resolution with environment variable override
//!
//! Subscription credentials are a subscription id plus a management
//! certificate. The certificate travels as base64 of the PEM bytes, both in
//! config files and in the environment.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::env;
use std::fmt;

use super::error::{ConfigError, Result};

/// Environment variable holding the subscription id
pub const SUBSCRIPTION_ID_ENV: &str = "AZSUBSCRIPTIONID";

/// Environment variable holding the base64 encoded PEM certificate
pub const CERT_DATA_ENV: &str = "AZCERTDATA";

/// Credential store abstraction
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialStore;

impl CredentialStore {
    pub fn new() -> Self {
        Self
    }

    /// Retrieve a credential value
    ///
    /// Resolution order:
    /// 1. Check environment variable (if env_var provided and non-empty)
    /// 2. Otherwise, return the value as-is
    pub fn get_credential(&self, value: &str, env_var: Option<&str>) -> String {
        if let Some(var) = env_var
            && let Ok(env_value) = env::var(var)
            && !env_value.is_empty()
        {
            return env_value;
        }
        value.to_string()
    }
}

/// Resolved subscription credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub subscription_id: String,
    /// PEM certificate bytes
    pub certificate: Vec<u8>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription_id", &self.subscription_id)
            .field("certificate", &format_args!("<{} bytes>", self.certificate.len()))
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a subscription id and base64 certificate data
    pub fn from_encoded(subscription_id: &str, cert_data: &str) -> Result<Self> {
        if subscription_id.trim().is_empty() {
            return Err(ConfigError::CredentialError(
                "subscription id is empty".to_string(),
            ));
        }
        let certificate = STANDARD.decode(cert_data.trim()).map_err(|e| {
            ConfigError::CredentialError(format!("certificate data is not valid base64: {}", e))
        })?;
        Ok(Self {
            subscription_id: subscription_id.trim().to_string(),
            certificate,
        })
    }

    /// Read credentials from `AZSUBSCRIPTIONID` and `AZCERTDATA`
    ///
    /// Returns `Ok(None)` when either variable is unset or empty, so callers
    /// can skip rather than fail. Malformed certificate data is an error.
    pub fn from_env() -> Result<Option<Self>> {
        let subscription_id = env::var(SUBSCRIPTION_ID_ENV).unwrap_or_default();
        let cert_data = env::var(CERT_DATA_ENV).unwrap_or_default();
        if subscription_id.is_empty() || cert_data.is_empty() {
            return Ok(None);
        }
        Self::from_encoded(&subscription_id, &cert_data).map(Some)
    }
}
