//! Configuration tree - the user's declared intent for one cluster
//!
//! Optional nested blocks are `Option<T>`: `None` means the block was not
//! supplied. Roles are kept in declaration order; names must be unique.
//!
//! Trees are read from TOML:
//!
//! ```toml
//! name = "cluster1"
//! resource_group_name = "rg1"
//! location = "West Europe"
//! cluster_version = "3.6"
//! os_type = "Linux"
//! tier = "Standard"
//!
//! [cluster_definition]
//! kind = "hadoop"
//!
//! [cluster_definition.configurations.gateway]
//! "restAuthCredential.isEnabled" = "true"
//!
//! [[compute_profile.role]]
//! name = "head"
//! target_instance_count = 2
//! hardware_profile = { vm_size = "Standard_D3_v2" }
//! os_profile = { username = "admin", password = "..." }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub cluster_version: String,
    pub os_type: OsType,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_definition: Option<ClusterDefinitionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_profile: Option<ComputeProfileConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<SecurityProfileConfig>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    // Computed by the remote side; ignored by expand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_settings: Option<DnsSettingsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    Linux,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Standard,
    Premium,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "Linux",
            OsType::Windows => "Windows",
        }
    }
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "Standard",
            Tier::Premium => "Premium",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The API echoes enumerations with varying case
impl FromStr for OsType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "windows" => Ok(OsType::Windows),
            other => Err(format!("unknown os type '{}'", other)),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDefinitionConfig {
    pub kind: String,
    /// Section name -> flat key/value bag. Write-only on the remote side.
    #[serde(default)]
    pub configurations: BTreeMap<String, BTreeMap<String, String>>,
    /// Computed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub component_version: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeProfileConfig {
    #[serde(default)]
    pub role: Vec<RoleConfig>,
}

impl ComputeProfileConfig {
    pub fn find_role(&self, name: &str) -> Option<&RoleConfig> {
        self.role.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    pub target_instance_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile: Option<HardwareProfileConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_profile: Option<OsProfileConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network_profile: Option<VirtualNetworkProfileConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfileConfig {
    pub vm_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsProfileConfig {
    pub username: String,
    /// Write-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkProfileConfig {
    pub id: String,
    pub subnet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfileConfig {
    pub domain: String,
    pub organizational_unit_dn: String,
    #[serde(default)]
    pub ldaps_urls: Vec<String>,
    pub domain_username: String,
    /// Write-only
    #[serde(default)]
    pub domain_user_password: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_users_group_dns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSettingsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_fqdn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "cluster1"
resource_group_name = "rg1"
location = "West Europe"
cluster_version = "3.6"
os_type = "Linux"
tier = "Standard"

[tags]
env = "dev"

[cluster_definition]
kind = "hadoop"

[cluster_definition.configurations.gateway]
"restAuthCredential.isEnabled" = "true"
"restAuthCredential.username" = "http-user"

[[compute_profile.role]]
name = "head"
target_instance_count = 2
hardware_profile = { vm_size = "Standard_D3_v2" }
os_profile = { username = "admin", password = "Secret123!" }

[[compute_profile.role]]
name = "worker"
target_instance_count = 3
hardware_profile = { vm_size = "Standard_D4_v2" }
os_profile = { username = "admin", ssh_keys = ["ssh-rsa AAAA"] }
"#;

    #[test]
    fn test_parse_toml_tree() {
        let tree: ClusterConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(tree.os_type, OsType::Linux);
        assert_eq!(tree.tier, Tier::Standard);
        assert!(tree.security_profile.is_none());

        let definition = tree.cluster_definition.as_ref().unwrap();
        assert_eq!(definition.kind, "hadoop");
        assert_eq!(
            definition.configurations["gateway"]["restAuthCredential.username"],
            "http-user"
        );

        let compute = tree.compute_profile.as_ref().unwrap();
        assert_eq!(compute.role.len(), 2);
        let worker = compute.find_role("worker").unwrap();
        assert_eq!(worker.os_profile.as_ref().unwrap().ssh_keys.len(), 1);
        assert!(worker.os_profile.as_ref().unwrap().password.is_none());
    }

    #[test]
    fn test_rejects_unknown_enum() {
        let bad = SAMPLE.replace("tier = \"Standard\"", "tier = \"Basic\"");
        assert!(toml::from_str::<ClusterConfig>(&bad).is_err());
    }

    #[test]
    fn test_enum_from_str_is_case_insensitive() {
        assert_eq!("linux".parse::<OsType>().unwrap(), OsType::Linux);
        assert_eq!("PREMIUM".parse::<Tier>().unwrap(), Tier::Premium);
        assert!("solaris".parse::<OsType>().is_err());
    }
}
