//! Role definitions passed through to deployment and update requests
//!
//! Only the parts the provisioning scenarios touch are modelled. The value
//! is handed to the collaborator as JSON and rendered from there.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Where the OS disk of a role comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum ImageSource {
    /// OS image copied into a new VHD at `media_link`
    PlatformImage {
        #[serde(rename = "SourceImageName")]
        source_image_name: String,
        #[serde(rename = "MediaLink")]
        media_link: String,
        #[serde(rename = "DiskLabel")]
        disk_label: String,
    },
    /// Captured VM image; disks are placed under `media_location`
    VmImage {
        #[serde(rename = "VMImageName")]
        name: String,
        #[serde(rename = "MediaLocation")]
        media_location: String,
        #[serde(rename = "ProvisionGuestAgent")]
        provision_guest_agent: bool,
    },
}

/// Guest OS provisioning settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ConfigurationSetType")]
pub enum Provisioning {
    #[serde(rename = "LinuxProvisioningConfiguration", rename_all = "PascalCase")]
    Linux {
        host_name: String,
        user_name: String,
        user_password: String,
        disable_ssh_password_authentication: bool,
    },
    #[serde(rename = "WindowsProvisioningConfiguration", rename_all = "PascalCase")]
    Windows {
        computer_name: String,
        admin_username: String,
        admin_password: String,
        enable_automatic_updates: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        time_zone: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputEndpoint {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub local_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterVisibility {
    Public,
    Private,
}

/// Base64 encoded extension configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtensionParameter {
    pub key: String,
    pub value: String,
    #[serde(rename = "Type")]
    pub visibility: ParameterVisibility,
}

/// A VM extension installed on (or removed from) a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtensionReference {
    pub reference_name: String,
    pub publisher: String,
    pub name: String,
    pub version: String,
    /// `enable`, `disable` or `uninstall`
    pub state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_extension_parameter_values: Vec<ExtensionParameter>,
}

impl ExtensionReference {
    pub fn is_uninstall(&self) -> bool {
        self.state.eq_ignore_ascii_case("uninstall")
    }
}

/// Role definition for a single-VM deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<Provisioning>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_endpoints: Vec<InputEndpoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_extension_references: Vec<ExtensionReference>,
}

impl RoleConfig {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            role_name: name.into(),
            role_size: size.into(),
            ..Self::default()
        }
    }

    pub fn from_platform_image(
        mut self,
        image_name: impl Into<String>,
        media_link: impl Into<String>,
        disk_label: impl Into<String>,
    ) -> Self {
        self.image = Some(ImageSource::PlatformImage {
            source_image_name: image_name.into(),
            media_link: media_link.into(),
            disk_label: disk_label.into(),
        });
        self
    }

    pub fn from_vm_image(
        mut self,
        image_name: impl Into<String>,
        media_location: impl Into<String>,
        provision_guest_agent: bool,
    ) -> Self {
        self.image = Some(ImageSource::VmImage {
            name: image_name.into(),
            media_location: media_location.into(),
            provision_guest_agent,
        });
        self
    }

    pub fn for_linux(
        mut self,
        host_name: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.provisioning = Some(Provisioning::Linux {
            host_name: host_name.into(),
            user_name: user_name.into(),
            user_password: password.into(),
            disable_ssh_password_authentication: false,
        });
        self
    }

    pub fn for_windows(
        mut self,
        computer_name: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
        enable_automatic_updates: bool,
        time_zone: impl Into<String>,
    ) -> Self {
        self.provisioning = Some(Provisioning::Windows {
            computer_name: computer_name.into(),
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            enable_automatic_updates,
            time_zone: time_zone.into(),
        });
        self
    }

    /// Open TCP 22 to the world
    pub fn with_public_ssh(mut self) -> Self {
        if !self.input_endpoints.iter().any(|e| e.name == "SSH") {
            self.input_endpoints.push(InputEndpoint {
                name: "SSH".to_string(),
                protocol: "tcp".to_string(),
                port: 22,
                local_port: 22,
            });
        }
        self
    }

    /// Add an extension reference; configs are base64 encoded
    #[allow(clippy::too_many_arguments)]
    pub fn with_extension(
        mut self,
        name: &str,
        publisher: &str,
        version: &str,
        reference_name: &str,
        state: &str,
        public_config: Option<&[u8]>,
        private_config: Option<&[u8]>,
    ) -> Self {
        let mut params = Vec::new();
        if let Some(config) = public_config {
            params.push(ExtensionParameter {
                key: "ignored".to_string(),
                value: STANDARD.encode(config),
                visibility: ParameterVisibility::Public,
            });
        }
        if let Some(config) = private_config {
            params.push(ExtensionParameter {
                key: "ignored".to_string(),
                value: STANDARD.encode(config),
                visibility: ParameterVisibility::Private,
            });
        }

        self.resource_extension_references.push(ExtensionReference {
            reference_name: reference_name.to_string(),
            publisher: publisher.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            state: state.to_string(),
            resource_extension_parameter_values: params,
        });
        self
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Serializing plain strings, bools and integers cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_linux_platform_role() {
        let role = RoleConfig::new("sdkvm", "Standard_D3")
            .from_platform_image("ubuntu-14_04", "http://acct.blob/sdktest/sdkvm.vhd", "disk")
            .for_linux("myvm", "azureuser", "pw")
            .with_public_ssh()
            .with_public_ssh();

        assert_eq!(role.input_endpoints.len(), 1);
        let value = role.to_value();
        assert_eq!(value["RoleName"], "sdkvm");
        assert_eq!(value["Image"]["Kind"], "PlatformImage");
        assert_eq!(value["Image"]["SourceImageName"], "ubuntu-14_04");
        assert_eq!(
            value["Provisioning"]["ConfigurationSetType"],
            "LinuxProvisioningConfiguration"
        );
        assert_eq!(value["InputEndpoints"][0]["Port"], 22);
    }

    #[test]
    fn test_extension_configs_are_base64() {
        let role = RoleConfig::default().with_extension(
            "CustomScriptForLinux",
            "Microsoft.OSTCExtensions",
            "1.2",
            "cs",
            "enable",
            Some(br#"{"commandToExecute":"touch /tmp/hello"}"#),
            None,
        );

        let ext = &role.resource_extension_references[0];
        assert_eq!(ext.resource_extension_parameter_values.len(), 1);
        assert_eq!(
            ext.resource_extension_parameter_values[0].value,
            STANDARD.encode(br#"{"commandToExecute":"touch /tmp/hello"}"#)
        );
        assert!(!ext.is_uninstall());
    }

    #[test]
    fn test_empty_role_serializes_empty() {
        assert_eq!(RoleConfig::default().to_value(), json!({}));
    }

    #[test]
    fn test_role_value_round_trips() {
        let role = RoleConfig::new("w", "Standard_D4")
            .from_vm_image("sql-image", "http://acct.blob/w", false)
            .for_windows("w", "azureuser", "pw", true, "");
        let parsed: RoleConfig = serde_json::from_value(role.to_value()).unwrap();
        assert_eq!(parsed, role);
    }
}
