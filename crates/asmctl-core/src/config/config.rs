//! Configuration management
//!
//! Handles configuration loading from files and environment variables.
//! Configuration is stored in TOML format with support for multiple named
//! subscription profiles and a shared `[wait]` table.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::credential::{CERT_DATA_ENV, CredentialStore, Credentials, SUBSCRIPTION_ID_ENV};
use super::error::{ConfigError, Result};
use crate::wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, Deadline, WaitOptions};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is named explicitly
    #[serde(default)]
    pub default_profile: Option<String>,
    /// Default wait settings for operations and convergence polls
    #[serde(default)]
    pub wait: WaitConfig,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual subscription profile
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub subscription_id: String,
    /// Base64 encoded PEM management certificate
    pub certificate: String,
    #[serde(default = "default_management_url")]
    pub management_url: String,
    /// Per-profile wait settings (override the top-level table)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitConfig>,
}

/// Wait settings as written in the config file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bound by number of reads instead of elapsed time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,
    /// Wait without any deadline
    #[serde(default)]
    pub unbounded: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            max_polls: None,
            unbounded: false,
        }
    }
}

impl WaitConfig {
    /// Convert to the options the await loop and poller take
    pub fn to_wait_options(&self) -> Result<WaitOptions> {
        let poll_interval = Duration::from_secs(self.poll_interval_secs);
        let deadline = match (self.unbounded, self.max_polls) {
            (true, Some(_)) => {
                return Err(ConfigError::InvalidWait(
                    "unbounded and max_polls are mutually exclusive".to_string(),
                ));
            }
            (true, None) => Deadline::Unbounded,
            (false, Some(0)) => {
                return Err(ConfigError::InvalidWait(
                    "max_polls must be at least 1".to_string(),
                ));
            }
            (false, Some(max)) => Deadline::MaxPolls(max),
            (false, None) => Deadline::After(Duration::from_secs(self.timeout_secs)),
        };
        Ok(WaitOptions::new(poll_interval, deadline))
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_management_url() -> String {
    "https://management.core.windows.net".to_string()
}

impl Profile {
    pub fn new(subscription_id: impl Into<String>, certificate: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            certificate: certificate.into(),
            management_url: default_management_url(),
            wait: None,
        }
    }

    /// Resolve credentials, letting `AZSUBSCRIPTIONID` / `AZCERTDATA` win
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        let store = CredentialStore::new();
        let subscription_id = store.get_credential(&self.subscription_id, Some(SUBSCRIPTION_ID_ENV));
        let cert_data = store.get_credential(&self.certificate, Some(CERT_DATA_ENV));
        Credentials::from_encoded(&subscription_id, &cert_data)
    }
}

impl Config {
    /// Name of the profile to use, given an optional explicit choice
    ///
    /// Falls back to `default_profile`, then to the only profile if exactly
    /// one exists.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile.or(self.default_profile.as_deref()) {
            if self.profiles.contains_key(name) {
                return Ok(name.to_string());
            }
            return Err(ConfigError::ProfileNotFound {
                name: name.to_string(),
            });
        }

        let mut names = self.profiles.keys();
        match (names.next(), names.next()) {
            (Some(only), None) => Ok(only.clone()),
            (None, _) => Err(ConfigError::NoProfiles {
                suggestion: format!(
                    "Add a [profiles.<name>] table or set {} and {}.",
                    SUBSCRIPTION_ID_ENV, CERT_DATA_ENV
                ),
            }),
            (Some(_), Some(_)) => Err(ConfigError::NoProfiles {
                suggestion: "Several profiles exist; set default_profile or name one explicitly."
                    .to_string(),
            }),
        }
    }

    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    /// Wait options for a profile, or the top-level table when `None`
    pub fn wait_options(&self, profile: Option<&str>) -> Result<WaitOptions> {
        match profile {
            Some(name) => match &self.profile(name)?.wait {
                Some(wait) => wait.to_wait_options(),
                None => self.wait.to_wait_options(),
            },
            None => self.wait.to_wait_options(),
        }
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile by name
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, `~/.config/asmctl/config.toml` is preferred when it exists,
    /// falling back to the platform location.
    ///
    /// On Linux: ~/.config/asmctl/config.toml
    /// On Windows: %APPDATA%\asmctl\asmctl\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("asmctl")
                    .join("config.toml");

                if linux_style_path
                    .parent()
                    .map(|p| p.exists())
                    .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("com", "asmctl", "asmctl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unset variables without a
    /// default are left as-is so unused profiles don't break loading.
    ///
    /// Example:
    /// ```toml
    /// [profiles.ci]
    /// subscription_id = "${AZSUBSCRIPTIONID}"
    /// certificate = "${AZCERTDATA}"
    /// management_url = "${AZ_MANAGEMENT_URL:-https://management.core.windows.net}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn profile() -> Profile {
        Profile::new("sub-1", "Y2VydA==")
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.set_profile("test".to_string(), profile());
        config.default_profile = Some("test".to_string());

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.default_profile, deserialized.default_profile);
        assert_eq!(config.profiles.len(), deserialized.profiles.len());
        assert_eq!(deserialized.wait, WaitConfig::default());
    }

    #[test]
    fn test_default_wait_is_bounded() {
        let options = WaitConfig::default().to_wait_options().unwrap();
        assert_eq!(options, WaitOptions::default());
    }

    #[test]
    fn test_wait_config_variants() {
        let wait = WaitConfig {
            poll_interval_secs: 5,
            max_polls: Some(12),
            ..WaitConfig::default()
        };
        assert_eq!(
            wait.to_wait_options().unwrap(),
            WaitOptions::with_max_polls(Duration::from_secs(5), 12)
        );

        let wait = WaitConfig {
            unbounded: true,
            ..WaitConfig::default()
        };
        assert_eq!(wait.to_wait_options().unwrap().deadline, Deadline::Unbounded);

        let wait = WaitConfig {
            unbounded: true,
            max_polls: Some(3),
            ..WaitConfig::default()
        };
        assert!(matches!(
            wait.to_wait_options(),
            Err(ConfigError::InvalidWait(_))
        ));

        let wait = WaitConfig {
            max_polls: Some(0),
            ..WaitConfig::default()
        };
        assert!(wait.to_wait_options().is_err());
    }

    #[test]
    fn test_resolve_profile() {
        let mut config = Config::default();
        assert!(matches!(
            config.resolve_profile(None),
            Err(ConfigError::NoProfiles { .. })
        ));

        config.set_profile("only".to_string(), profile());
        assert_eq!(config.resolve_profile(None).unwrap(), "only");

        config.set_profile("other".to_string(), profile());
        assert!(config.resolve_profile(None).is_err());
        assert_eq!(config.resolve_profile(Some("other")).unwrap(), "other");
        assert!(matches!(
            config.resolve_profile(Some("missing")),
            Err(ConfigError::ProfileNotFound { .. })
        ));

        config.default_profile = Some("only".to_string());
        assert_eq!(config.resolve_profile(None).unwrap(), "only");
    }

    #[test]
    fn test_remove_profile_clears_default() {
        let mut config = Config::default();
        config.set_profile("p".to_string(), profile());
        config.default_profile = Some("p".to_string());

        assert!(config.remove_profile("p").is_some());
        assert!(config.default_profile.is_none());
    }

    #[test]
    fn test_profile_wait_overrides_top_level() {
        let mut config = Config::default();
        let mut p = profile();
        p.wait = Some(WaitConfig {
            poll_interval_secs: 1,
            ..WaitConfig::default()
        });
        config.set_profile("fast".to_string(), p);
        config.set_profile("plain".to_string(), profile());

        assert_eq!(
            config.wait_options(Some("fast")).unwrap().poll_interval,
            Duration::from_secs(1)
        );
        assert_eq!(
            config.wait_options(Some("plain")).unwrap(),
            WaitOptions::default()
        );
    }

    #[test]
    #[serial]
    fn test_resolve_credentials_prefers_env() {
        unsafe {
            std::env::remove_var(SUBSCRIPTION_ID_ENV);
            std::env::remove_var(CERT_DATA_ENV);
        }
        let creds = profile().resolve_credentials().unwrap();
        assert_eq!(creds.subscription_id, "sub-1");
        assert_eq!(creds.certificate, b"cert");

        unsafe {
            std::env::set_var(SUBSCRIPTION_ID_ENV, "sub-env");
        }
        let creds = profile().resolve_credentials().unwrap();
        assert_eq!(creds.subscription_id, "sub-env");
        unsafe {
            std::env::remove_var(SUBSCRIPTION_ID_ENV);
        }
    }

    #[test]
    #[serial]
    fn test_env_var_expansion() {
        unsafe {
            std::env::set_var("ASMCTL_TEST_SUB", "expanded-sub");
            std::env::remove_var("ASMCTL_TEST_MISSING");
        }

        let content = r#"
[profiles.test]
subscription_id = "${ASMCTL_TEST_SUB}"
certificate = "Y2VydA=="
management_url = "${ASMCTL_TEST_MISSING:-https://example.test}"
"#;

        let expanded = Config::expand_env_vars(content);
        assert!(expanded.contains("expanded-sub"));
        assert!(expanded.contains("https://example.test"));

        unsafe {
            std::env::remove_var("ASMCTL_TEST_SUB");
        }
    }
}
