//! Flatten: remote cluster -> configuration tree
//!
//! Absent remote sub-blocks become `None`, never zero-valued blocks, so a
//! later diff does not report drift that isn't there. Write-only values
//! (passwords, configurations, keys the API doesn't echo) are carried over
//! from the previously stored tree.

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::id::ResourceId;
use crate::models::{
    Cluster, ClusterDefinition, ComputeProfile, ConnectivityEndpoint, DnsSettings, OsProfile, Role,
    SecurityProfile,
};
use crate::tree::{
    ClusterConfig, ClusterDefinitionConfig, ComputeProfileConfig, DnsSettingsConfig,
    HardwareProfileConfig, OsProfileConfig, OsType, RoleConfig, SecurityProfileConfig, Tier,
    VirtualNetworkProfileConfig,
};

/// Build the configuration tree for `remote`.
///
/// `prior` is the tree stored before this read (or the desired tree right
/// after a create); it only supplies write-only values and fallbacks.
pub fn flatten_cluster(
    remote: &Cluster,
    id: &ResourceId,
    prior: Option<&ClusterConfig>,
) -> ClusterConfig {
    let props = remote.properties.as_ref();

    let location = remote
        .location
        .as_deref()
        .map(normalize_location)
        .or_else(|| prior.map(|p| normalize_location(&p.location)))
        .unwrap_or_default();

    let cluster_version = props
        .and_then(|p| p.cluster_version.clone())
        .or_else(|| prior.map(|p| p.cluster_version.clone()))
        .unwrap_or_default();

    let os_type = props
        .and_then(|p| p.os_type.as_deref())
        .and_then(|s| s.parse::<OsType>().ok())
        .or_else(|| prior.map(|p| p.os_type))
        .unwrap_or_else(|| {
            warn!(cluster = %id.name, "os type missing from response, assuming Linux");
            OsType::Linux
        });

    let tier = props
        .and_then(|p| p.tier.as_deref())
        .and_then(|s| s.parse::<Tier>().ok())
        .or_else(|| prior.map(|p| p.tier))
        .unwrap_or_else(|| {
            warn!(cluster = %id.name, "tier missing from response, assuming Standard");
            Tier::Standard
        });

    let (https_endpoint, ssh_endpoint) =
        flatten_connectivity_endpoints(props.and_then(|p| p.connectivity_endpoints.as_deref()));

    ClusterConfig {
        name: id.name.clone(),
        resource_group_name: id.resource_group.clone(),
        location,
        cluster_version,
        os_type,
        tier,
        cluster_definition: props
            .and_then(|p| p.cluster_definition.as_ref())
            .map(|d| {
                flatten_cluster_definition(d, prior.and_then(|p| p.cluster_definition.as_ref()))
            }),
        compute_profile: props
            .and_then(|p| p.compute_profile.as_ref())
            .map(|c| flatten_compute_profile(c, prior.and_then(|p| p.compute_profile.as_ref()))),
        security_profile: props
            .and_then(|p| p.security_profile.as_ref())
            .map(|s| {
                flatten_security_profile(s, prior.and_then(|p| p.security_profile.as_ref()))
            }),
        tags: flatten_tags(remote.tags.as_ref()),
        dns_settings: flatten_dns_settings(props.and_then(|p| p.dns_settings.as_ref())),
        https_endpoint,
        ssh_endpoint,
    }
}

/// Lowercase with spaces removed, so `West Europe` and `westeurope` compare equal
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

pub fn flatten_tags(tags: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    tags.map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

pub fn flatten_dns_settings(dns: Option<&DnsSettings>) -> Option<DnsSettingsConfig> {
    let dns = dns?;
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let flattened = DnsSettingsConfig {
        domain_name_label: non_empty(&dns.domain_name_label),
        fqdn: non_empty(&dns.fqdn),
        reverse_fqdn: non_empty(&dns.reverse_fqdn),
    };
    if flattened == DnsSettingsConfig::default() {
        None
    } else {
        Some(flattened)
    }
}

pub fn flatten_cluster_definition(
    definition: &ClusterDefinition,
    prior: Option<&ClusterDefinitionConfig>,
) -> ClusterDefinitionConfig {
    let configurations = match &definition.configurations {
        Some(sections) if !sections.is_empty() => sections
            .iter()
            .filter_map(|(section, bag)| {
                let bag = bag.as_object()?;
                let values: BTreeMap<String, String> = bag
                    .iter()
                    .map(|(k, v)| {
                        let v = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect();
                Some((section.clone(), values))
            })
            .collect(),
        // Not returned by GET
        _ => prior.map(|p| p.configurations.clone()).unwrap_or_default(),
    };

    ClusterDefinitionConfig {
        kind: definition.kind.clone(),
        configurations,
        component_version: definition
            .component_version
            .as_ref()
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
    }
}

pub fn flatten_compute_profile(
    compute: &ComputeProfile,
    prior: Option<&ComputeProfileConfig>,
) -> ComputeProfileConfig {
    ComputeProfileConfig {
        role: compute
            .roles
            .iter()
            .map(|role| flatten_role(role, prior.and_then(|p| p.find_role(&role.name))))
            .collect(),
    }
}

pub fn flatten_role(role: &Role, prior: Option<&RoleConfig>) -> RoleConfig {
    RoleConfig {
        name: role.name.clone(),
        target_instance_count: role.target_instance_count,
        hardware_profile: role.hardware_profile.as_ref().map(|h| HardwareProfileConfig {
            vm_size: h.vm_size.clone(),
        }),
        os_profile: role
            .os_profile
            .as_ref()
            .and_then(|os| flatten_os_profile(os, prior.and_then(|p| p.os_profile.as_ref()))),
        virtual_network_profile: role.virtual_network_profile.as_ref().map(|v| {
            VirtualNetworkProfileConfig {
                id: v.id.clone(),
                subnet: v.subnet.clone(),
            }
        }),
    }
}

fn flatten_os_profile(os: &OsProfile, prior: Option<&OsProfileConfig>) -> Option<OsProfileConfig> {
    let linux = os.linux_operating_system_profile.as_ref()?;

    let ssh_keys: Vec<String> = linux
        .ssh_profile
        .as_ref()
        .map(|s| {
            s.public_keys
                .iter()
                .map(|k| k.certificate_data.clone())
                .collect()
        })
        .unwrap_or_default();

    Some(OsProfileConfig {
        username: linux.username.clone(),
        password: linux
            .password
            .clone()
            .or_else(|| prior.and_then(|p| p.password.clone())),
        ssh_keys: if ssh_keys.is_empty() {
            prior.map(|p| p.ssh_keys.clone()).unwrap_or_default()
        } else {
            ssh_keys
        },
    })
}

pub fn flatten_security_profile(
    security: &SecurityProfile,
    prior: Option<&SecurityProfileConfig>,
) -> SecurityProfileConfig {
    SecurityProfileConfig {
        domain: security.domain.clone(),
        organizational_unit_dn: security.organizational_unit_dn.clone(),
        ldaps_urls: security.ldaps_urls.clone(),
        domain_username: security.domain_username.clone(),
        domain_user_password: security
            .domain_user_password
            .clone()
            .or_else(|| prior.map(|p| p.domain_user_password.clone()))
            .unwrap_or_default(),
        cluster_users_group_dns: security.cluster_users_group_dns.clone(),
    }
}

/// `(https, ssh)` host names from the connectivity endpoints
pub fn flatten_connectivity_endpoints(
    endpoints: Option<&[ConnectivityEndpoint]>,
) -> (Option<String>, Option<String>) {
    (
        find_endpoint(endpoints, "HTTPS"),
        find_endpoint(endpoints, "SSH"),
    )
}

fn find_endpoint(endpoints: Option<&[ConnectivityEndpoint]>, name: &str) -> Option<String> {
    endpoints?
        .iter()
        .find(|e| e.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .and_then(|e| e.location.clone())
}
