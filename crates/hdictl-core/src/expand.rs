//! Expand: configuration tree -> create request
//!
//! Expansion is total for valid input and fails fast on the first structural
//! violation, returning the path of the offending field. A request is never
//! partially built.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ValidationError;
use crate::models::{
    ClusterCreateParameters, ClusterCreateProperties, ClusterDefinition, ClusterPatchParameters,
    ComputeProfile, DIRECTORY_TYPE_ACTIVE_DIRECTORY, HardwareProfile, LinuxOperatingSystemProfile,
    OsProfile, Role, SecurityProfile, SshProfile, SshPublicKey, VirtualNetworkProfile,
};
use crate::tree::{
    ClusterConfig, ClusterDefinitionConfig, ComputeProfileConfig, HardwareProfileConfig,
    OsProfileConfig, RoleConfig, SecurityProfileConfig, VirtualNetworkProfileConfig,
};

type Result<T> = std::result::Result<T, ValidationError>;

// ARM tag limits
const MAX_TAGS: usize = 50;
const MAX_TAG_KEY_LEN: usize = 512;
const MAX_TAG_VALUE_LEN: usize = 256;

/// Build the full create request for `config`
pub fn expand_cluster(config: &ClusterConfig) -> Result<ClusterCreateParameters> {
    require("location", &config.location)?;
    require("cluster_version", &config.cluster_version)?;

    let definition = config
        .cluster_definition
        .as_ref()
        .ok_or_else(|| missing_block("cluster_definition"))?;
    let compute = config
        .compute_profile
        .as_ref()
        .ok_or_else(|| missing_block("compute_profile"))?;

    let cluster_definition = expand_cluster_definition(definition)?;
    let compute_profile = expand_compute_profile(compute)?;
    let security_profile = config
        .security_profile
        .as_ref()
        .map(expand_security_profile)
        .transpose()?;
    let tags = expand_tags(&config.tags)?;

    Ok(ClusterCreateParameters {
        location: config.location.clone(),
        tags,
        properties: ClusterCreateProperties {
            cluster_version: config.cluster_version.clone(),
            os_type: config.os_type.as_str().to_string(),
            tier: config.tier.as_str().to_string(),
            cluster_definition,
            compute_profile,
            security_profile,
        },
    })
}

/// Build the tags-only patch body
pub fn expand_patch(config: &ClusterConfig) -> Result<ClusterPatchParameters> {
    Ok(ClusterPatchParameters {
        tags: expand_tags(&config.tags)?,
    })
}

/// Each configuration name becomes its own section wrapping its key/value bag
pub fn expand_cluster_definition(
    definition: &ClusterDefinitionConfig,
) -> Result<ClusterDefinition> {
    require("cluster_definition.kind", &definition.kind)?;

    let configurations = if definition.configurations.is_empty() {
        None
    } else {
        let mut sections = Map::new();
        for (section, values) in &definition.configurations {
            let bag: Map<String, Value> = values
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            sections.insert(section.clone(), Value::Object(bag));
        }
        Some(sections)
    };

    Ok(ClusterDefinition {
        blueprint: None,
        kind: definition.kind.clone(),
        component_version: None,
        configurations,
    })
}

pub fn expand_compute_profile(compute: &ComputeProfileConfig) -> Result<ComputeProfile> {
    if compute.role.is_empty() {
        return Err(ValidationError::EmptySet {
            path: "compute_profile.role".to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut roles = Vec::with_capacity(compute.role.len());
    for (idx, role) in compute.role.iter().enumerate() {
        if !seen.insert(role.name.as_str()) {
            return Err(ValidationError::DuplicateRole {
                path: "compute_profile.role".to_string(),
                name: role.name.clone(),
            });
        }
        roles.push(expand_role(role, &format!("compute_profile.role[{}]", idx))?);
    }

    Ok(ComputeProfile { roles })
}

fn expand_role(role: &RoleConfig, path: &str) -> Result<Role> {
    require(&format!("{}.name", path), &role.name)?;
    if role.target_instance_count < 1 {
        return Err(ValidationError::MissingField {
            path: format!("{}.target_instance_count", path),
        });
    }

    let hardware = role
        .hardware_profile
        .as_ref()
        .ok_or_else(|| missing_block(&format!("{}.hardware_profile", path)))?;
    let os = role
        .os_profile
        .as_ref()
        .ok_or_else(|| missing_block(&format!("{}.os_profile", path)))?;

    Ok(Role {
        name: role.name.clone(),
        min_instance_count: None,
        target_instance_count: role.target_instance_count,
        hardware_profile: Some(expand_hardware_profile(
            hardware,
            &format!("{}.hardware_profile", path),
        )?),
        os_profile: Some(expand_os_profile(os, &format!("{}.os_profile", path))?),
        virtual_network_profile: role
            .virtual_network_profile
            .as_ref()
            .map(|v| expand_virtual_network_profile(v, &format!("{}.virtual_network_profile", path)))
            .transpose()?,
    })
}

pub fn expand_hardware_profile(
    hardware: &HardwareProfileConfig,
    path: &str,
) -> Result<HardwareProfile> {
    require(&format!("{}.vm_size", path), &hardware.vm_size)?;
    Ok(HardwareProfile {
        vm_size: hardware.vm_size.clone(),
    })
}

/// Exactly one of password or a non-empty key list must be given
pub fn expand_os_profile(os: &OsProfileConfig, path: &str) -> Result<OsProfile> {
    require(&format!("{}.username", path), &os.username)?;

    let password = os.password.as_deref().filter(|p| !p.is_empty());
    let has_keys = !os.ssh_keys.is_empty();
    if password.is_some() == has_keys {
        return Err(ValidationError::InvalidCredentialSpec {
            path: path.to_string(),
        });
    }

    let ssh_profile = has_keys.then(|| SshProfile {
        public_keys: os
            .ssh_keys
            .iter()
            .map(|key| SshPublicKey {
                certificate_data: key.clone(),
            })
            .collect(),
    });

    Ok(OsProfile {
        linux_operating_system_profile: Some(LinuxOperatingSystemProfile {
            username: os.username.clone(),
            password: password.map(str::to_string),
            ssh_profile,
        }),
    })
}

pub fn expand_virtual_network_profile(
    vnet: &VirtualNetworkProfileConfig,
    path: &str,
) -> Result<VirtualNetworkProfile> {
    require(&format!("{}.id", path), &vnet.id)?;
    require(&format!("{}.subnet", path), &vnet.subnet)?;
    Ok(VirtualNetworkProfile {
        id: vnet.id.clone(),
        subnet: vnet.subnet.clone(),
    })
}

/// Only called when the block is present; every sub-field is then required
pub fn expand_security_profile(security: &SecurityProfileConfig) -> Result<SecurityProfile> {
    const PATH: &str = "security_profile";
    require(&format!("{}.domain", PATH), &security.domain)?;
    require(
        &format!("{}.organizational_unit_dn", PATH),
        &security.organizational_unit_dn,
    )?;
    if security.ldaps_urls.is_empty() {
        return Err(ValidationError::EmptySet {
            path: format!("{}.ldaps_urls", PATH),
        });
    }
    require(&format!("{}.domain_username", PATH), &security.domain_username)?;
    require(
        &format!("{}.domain_user_password", PATH),
        &security.domain_user_password,
    )?;

    Ok(SecurityProfile {
        directory_type: DIRECTORY_TYPE_ACTIVE_DIRECTORY.to_string(),
        domain: security.domain.clone(),
        organizational_unit_dn: security.organizational_unit_dn.clone(),
        ldaps_urls: security.ldaps_urls.clone(),
        domain_username: security.domain_username.clone(),
        domain_user_password: Some(security.domain_user_password.clone()),
        cluster_users_group_dns: security.cluster_users_group_dns.clone(),
    })
}

pub fn expand_tags(tags: &BTreeMap<String, String>) -> Result<HashMap<String, String>> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::InvalidTags {
            path: "tags".to_string(),
            reason: format!("a maximum of {} tags is allowed, got {}", MAX_TAGS, tags.len()),
        });
    }
    for (key, value) in tags {
        if key.len() > MAX_TAG_KEY_LEN {
            return Err(ValidationError::InvalidTags {
                path: format!("tags.{}", key),
                reason: format!("key exceeds {} characters", MAX_TAG_KEY_LEN),
            });
        }
        if value.len() > MAX_TAG_VALUE_LEN {
            return Err(ValidationError::InvalidTags {
                path: format!("tags.{}", key),
                reason: format!("value exceeds {} characters", MAX_TAG_VALUE_LEN),
            });
        }
    }
    Ok(tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn require(path: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            path: path.to_string(),
        });
    }
    Ok(())
}

fn missing_block(path: &str) -> ValidationError {
    ValidationError::MissingBlock {
        path: path.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tree::{OsType, Tier};
    use pretty_assertions::assert_eq;

    pub(crate) fn head_role() -> RoleConfig {
        RoleConfig {
            name: "head".to_string(),
            target_instance_count: 2,
            hardware_profile: Some(HardwareProfileConfig {
                vm_size: "Standard_D3_v2".to_string(),
            }),
            os_profile: Some(OsProfileConfig {
                username: "admin".to_string(),
                password: Some("Password123!".to_string()),
                ssh_keys: vec![],
            }),
            virtual_network_profile: None,
        }
    }

    pub(crate) fn sample_config() -> ClusterConfig {
        ClusterConfig {
            name: "cluster1".to_string(),
            resource_group_name: "rg1".to_string(),
            location: "westeurope".to_string(),
            cluster_version: "3.6".to_string(),
            os_type: OsType::Linux,
            tier: Tier::Standard,
            cluster_definition: Some(ClusterDefinitionConfig {
                kind: "hadoop".to_string(),
                configurations: BTreeMap::from([(
                    "gateway".to_string(),
                    BTreeMap::from([
                        (
                            "restAuthCredential.isEnabled".to_string(),
                            "true".to_string(),
                        ),
                        (
                            "restAuthCredential.username".to_string(),
                            "http-user".to_string(),
                        ),
                    ]),
                )]),
                component_version: BTreeMap::new(),
            }),
            compute_profile: Some(ComputeProfileConfig {
                role: vec![head_role()],
            }),
            security_profile: None,
            tags: BTreeMap::from([("env".to_string(), "dev".to_string())]),
            dns_settings: None,
            https_endpoint: None,
            ssh_endpoint: None,
        }
    }

    fn security() -> SecurityProfileConfig {
        SecurityProfileConfig {
            domain: "corp.example.com".to_string(),
            organizational_unit_dn: "OU=hdi,DC=corp".to_string(),
            ldaps_urls: vec!["ldaps://corp.example.com:636".to_string()],
            domain_username: "admin@corp.example.com".to_string(),
            domain_user_password: "DomainPass1!".to_string(),
            cluster_users_group_dns: vec![],
        }
    }

    #[test]
    fn test_expand_cluster() {
        let request = expand_cluster(&sample_config()).unwrap();
        assert_eq!(request.location, "westeurope");
        assert_eq!(request.tags.get("env").map(String::as_str), Some("dev"));
        assert_eq!(request.properties.os_type, "Linux");
        assert_eq!(request.properties.tier, "Standard");
        assert!(request.properties.security_profile.is_none());

        let roles = &request.properties.compute_profile.roles;
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "head");
        assert_eq!(roles[0].target_instance_count, 2);
        assert_eq!(
            roles[0].hardware_profile.as_ref().unwrap().vm_size,
            "Standard_D3_v2"
        );
    }

    #[test]
    fn test_configurations_are_wrapped_in_sections() {
        let request = expand_cluster(&sample_config()).unwrap();
        let configurations = request
            .properties
            .cluster_definition
            .configurations
            .unwrap();
        assert_eq!(
            Value::Object(configurations),
            serde_json::json!({
                "gateway": {
                    "restAuthCredential.isEnabled": "true",
                    "restAuthCredential.username": "http-user"
                }
            })
        );
    }

    #[test]
    fn test_empty_configurations_are_unset() {
        let mut config = sample_config();
        config
            .cluster_definition
            .as_mut()
            .unwrap()
            .configurations
            .clear();
        let request = expand_cluster(&config).unwrap();
        assert!(request.properties.cluster_definition.configurations.is_none());
    }

    #[test]
    fn test_missing_blocks_fail() {
        let mut config = sample_config();
        config.cluster_definition = None;
        assert_eq!(
            expand_cluster(&config).unwrap_err(),
            ValidationError::MissingBlock {
                path: "cluster_definition".to_string()
            }
        );

        let mut config = sample_config();
        config.compute_profile = Some(ComputeProfileConfig { role: vec![] });
        assert_eq!(
            expand_cluster(&config).unwrap_err(),
            ValidationError::EmptySet {
                path: "compute_profile.role".to_string()
            }
        );
    }

    #[test]
    fn test_missing_os_profile_fails_with_path() {
        let mut config = sample_config();
        let mut worker = head_role();
        worker.name = "worker".to_string();
        worker.os_profile = None;
        config.compute_profile.as_mut().unwrap().role.push(worker);

        assert_eq!(
            expand_cluster(&config).unwrap_err(),
            ValidationError::MissingBlock {
                path: "compute_profile.role[1].os_profile".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_role_names_fail() {
        let mut config = sample_config();
        config
            .compute_profile
            .as_mut()
            .unwrap()
            .role
            .push(head_role());
        assert!(matches!(
            expand_cluster(&config).unwrap_err(),
            ValidationError::DuplicateRole { name, .. } if name == "head"
        ));
    }

    #[test]
    fn test_os_profile_credential_invariant() {
        let path = "compute_profile.role[0].os_profile";
        let neither = OsProfileConfig {
            username: "admin".to_string(),
            password: None,
            ssh_keys: vec![],
        };
        assert_eq!(
            expand_os_profile(&neither, path).unwrap_err(),
            ValidationError::InvalidCredentialSpec {
                path: path.to_string()
            }
        );

        let both = OsProfileConfig {
            password: Some("pw".to_string()),
            ssh_keys: vec!["ssh-rsa AAAA".to_string()],
            ..neither.clone()
        };
        assert!(matches!(
            expand_os_profile(&both, path).unwrap_err(),
            ValidationError::InvalidCredentialSpec { .. }
        ));

        let password_only = OsProfileConfig {
            password: Some("pw".to_string()),
            ..neither.clone()
        };
        let linux = expand_os_profile(&password_only, path)
            .unwrap()
            .linux_operating_system_profile
            .unwrap();
        assert_eq!(linux.password.as_deref(), Some("pw"));
        assert!(linux.ssh_profile.is_none());

        let keys_only = OsProfileConfig {
            ssh_keys: vec!["ssh-rsa AAAA".to_string()],
            ..neither
        };
        let linux = expand_os_profile(&keys_only, path)
            .unwrap()
            .linux_operating_system_profile
            .unwrap();
        assert!(linux.password.is_none());
        assert_eq!(
            linux.ssh_profile.unwrap().public_keys[0].certificate_data,
            "ssh-rsa AAAA"
        );
    }

    #[test]
    fn test_empty_password_counts_as_absent() {
        let os = OsProfileConfig {
            username: "admin".to_string(),
            password: Some(String::new()),
            ssh_keys: vec![],
        };
        assert!(expand_os_profile(&os, "p").is_err());
    }

    #[test]
    fn test_security_profile_sets_directory_type() {
        let mut config = sample_config();
        config.security_profile = Some(security());
        let request = expand_cluster(&config).unwrap();
        let profile = request.properties.security_profile.unwrap();
        assert_eq!(profile.directory_type, "ActiveDirectory");
        assert_eq!(profile.domain_user_password.as_deref(), Some("DomainPass1!"));
    }

    #[test]
    fn test_security_profile_requires_all_fields() {
        let mut profile = security();
        profile.ldaps_urls.clear();
        assert_eq!(
            expand_security_profile(&profile).unwrap_err(),
            ValidationError::EmptySet {
                path: "security_profile.ldaps_urls".to_string()
            }
        );

        let mut profile = security();
        profile.domain_user_password.clear();
        assert_eq!(
            expand_security_profile(&profile).unwrap_err().path(),
            "security_profile.domain_user_password"
        );
    }

    #[test]
    fn test_tag_limits() {
        let too_many: BTreeMap<String, String> = (0..51)
            .map(|i| (format!("k{}", i), "v".to_string()))
            .collect();
        assert!(matches!(
            expand_tags(&too_many).unwrap_err(),
            ValidationError::InvalidTags { .. }
        ));

        let long_value = BTreeMap::from([("k".to_string(), "v".repeat(257))]);
        assert_eq!(expand_tags(&long_value).unwrap_err().path(), "tags.k");
    }
}
