//! ARM object graph for `Microsoft.HDInsight/clusters`
//!
//! Field names follow the REST API (camelCase on the wire). Optional fields
//! stay `None` when unset so the remote side can tell "unset" from "empty".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Body of the create (PUT) call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCreateParameters {
    pub location: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    pub properties: ClusterCreateProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCreateProperties {
    pub cluster_version: String,
    pub os_type: String,
    pub tier: String,
    pub cluster_definition: ClusterDefinition,
    pub compute_profile: ComputeProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<SecurityProfile>,
}

/// Body of the tags-only PATCH call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterPatchParameters {
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_version: Option<HashMap<String, String>>,
    /// Configuration sections, e.g. `{"gateway": {"restAuthCredential.isEnabled": "true"}}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeProfile {
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instance_count: Option<i32>,
    pub target_instance_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile: Option<HardwareProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_profile: Option<OsProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network_profile: Option<VirtualNetworkProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_operating_system_profile: Option<LinuxOperatingSystemProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxOperatingSystemProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_profile: Option<SshProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshProfile {
    #[serde(default)]
    pub public_keys: Vec<SshPublicKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKey {
    pub certificate_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProfile {
    pub id: String,
    pub subnet: String,
}

/// Directory type is always Active Directory; not user configurable
pub const DIRECTORY_TYPE_ACTIVE_DIRECTORY: &str = "ActiveDirectory";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    pub directory_type: String,
    pub domain: String,
    #[serde(rename = "organizationalUnitDN")]
    pub organizational_unit_dn: String,
    #[serde(default)]
    pub ldaps_urls: Vec<String>,
    pub domain_username: String,
    /// Write-only; never returned by GET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_user_password: Option<String>,
    #[serde(
        default,
        rename = "clusterUsersGroupDNs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub cluster_users_group_dns: Vec<String>,
}

/// Cluster as returned by GET
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub properties: Option<ClusterGetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGetProperties {
    #[serde(default)]
    pub cluster_version: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub cluster_definition: Option<ClusterDefinition>,
    #[serde(default)]
    pub compute_profile: Option<ComputeProfile>,
    #[serde(default)]
    pub security_profile: Option<SecurityProfile>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub cluster_state: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub connectivity_endpoints: Option<Vec<ConnectivityEndpoint>>,
    #[serde(default)]
    pub dns_settings: Option<DnsSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityEndpoint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSettings {
    #[serde(default)]
    pub domain_name_label: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub reverse_fqdn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_parameters_wire_shape() {
        let params = ClusterCreateParameters {
            location: "westeurope".to_string(),
            tags: HashMap::new(),
            properties: ClusterCreateProperties {
                cluster_version: "3.6".to_string(),
                os_type: "Linux".to_string(),
                tier: "Standard".to_string(),
                cluster_definition: ClusterDefinition {
                    kind: "hadoop".to_string(),
                    ..Default::default()
                },
                compute_profile: ComputeProfile::default(),
                security_profile: None,
            },
        };

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["properties"]["clusterVersion"], "3.6");
        assert_eq!(value["properties"]["clusterDefinition"]["kind"], "hadoop");
        // Unset optionals must not appear on the wire
        assert!(value.get("tags").is_none());
        assert!(value["properties"].get("securityProfile").is_none());
        assert!(
            value["properties"]["clusterDefinition"]
                .get("configurations")
                .is_none()
        );
    }

    #[test]
    fn test_cluster_get_tolerates_missing_fields() {
        let cluster: Cluster = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.HDInsight/clusters/c",
            "name": "c",
            "properties": {
                "clusterVersion": "3.6.1000.67",
                "securityProfile": {
                    "directoryType": "ActiveDirectory",
                    "domain": "corp.example.com",
                    "organizationalUnitDN": "OU=hdi,DC=corp",
                    "ldapsUrls": ["ldaps://corp.example.com:636"],
                    "domainUsername": "admin@corp.example.com"
                }
            }
        }))
        .unwrap();

        let props = cluster.properties.unwrap();
        assert!(props.compute_profile.is_none());
        let security = props.security_profile.unwrap();
        assert_eq!(security.organizational_unit_dn, "OU=hdi,DC=corp");
        assert!(security.domain_user_password.is_none());
    }
}
