use anyhow::{Context, Result};
use colored::Colorize;
use hdictl_core::ClusterConfig;
use serde::Serialize;

use crate::cli;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Short human summary where one exists
    #[default]
    Human,
    Json,
    Yaml,
}

impl From<cli::OutputFormat> for OutputFormat {
    fn from(format: cli::OutputFormat) -> Self {
        match format {
            cli::OutputFormat::Auto => OutputFormat::Human,
            cli::OutputFormat::Json => OutputFormat::Json,
            cli::OutputFormat::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Serialize `data` to stdout. `Human` falls back to pretty JSON.
pub fn print_output<T: Serialize>(data: T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Human => {
            let json = serde_json::to_string_pretty(&data).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&data).context("Failed to serialize to YAML")?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Print a cluster tree; the human form lists the fields people look for.
pub fn print_cluster(cluster: &ClusterConfig, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Human {
        return print_output(redact(cluster), format);
    }

    println!("{}", cluster.name.bold());
    println!("  resource group:  {}", cluster.resource_group_name);
    println!("  location:        {}", cluster.location);
    println!("  version:         {}", cluster.cluster_version);
    println!("  os / tier:       {} / {}", cluster.os_type, cluster.tier);
    if let Some(definition) = &cluster.cluster_definition {
        println!("  kind:            {}", definition.kind);
    }
    if let Some(compute) = &cluster.compute_profile {
        for role in &compute.role {
            let vm_size = role
                .hardware_profile
                .as_ref()
                .map(|h| h.vm_size.as_str())
                .unwrap_or("?");
            println!(
                "  role {:<10} {} x {}",
                role.name, role.target_instance_count, vm_size
            );
        }
    }
    if let Some(endpoint) = &cluster.https_endpoint {
        println!("  https:           {}", endpoint);
    }
    if let Some(endpoint) = &cluster.ssh_endpoint {
        println!("  ssh:             {}", endpoint);
    }
    for (key, value) in &cluster.tags {
        println!("  tag {}={}", key, value);
    }
    Ok(())
}

/// Copy of `cluster` with secrets masked for display
fn redact(cluster: &ClusterConfig) -> ClusterConfig {
    const MASK: &str = "***";
    let mut shown = cluster.clone();

    if let Some(definition) = shown.cluster_definition.as_mut() {
        for section in definition.configurations.values_mut() {
            for (key, value) in section.iter_mut() {
                if key.to_ascii_lowercase().contains("password") {
                    *value = MASK.to_string();
                }
            }
        }
    }
    if let Some(compute) = shown.compute_profile.as_mut() {
        for os in compute.role.iter_mut().filter_map(|r| r.os_profile.as_mut()) {
            if os.password.is_some() {
                os.password = Some(MASK.to_string());
            }
        }
    }
    if let Some(security) = shown.security_profile.as_mut()
        && !security.domain_user_password.is_empty()
    {
        security.domain_user_password = MASK.to_string();
    }
    shown
}
