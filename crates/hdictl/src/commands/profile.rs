//! Profile management commands

use crate::cli::{OutputFormat as CliOutputFormat, ProfileCommands};
use crate::connection::ConnectionManager;
use crate::error::{HdiCtlError, Result};
use crate::output::{OutputFormat, print_output};
use hdictl_core::config::CredentialStore;
use hdictl_core::{Config, Profile};
use serde_json::json;
use tracing::{debug, trace};

pub async fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    conn_mgr: &ConnectionManager,
    output: CliOutputFormat,
) -> Result<()> {
    match profile_cmd {
        ProfileCommands::List => handle_list(conn_mgr, output),
        ProfileCommands::Path => handle_path(conn_mgr, output),
        ProfileCommands::Show { name } => handle_show(conn_mgr, name, output),
        ProfileCommands::Set {
            name,
            subscription_id,
            endpoint,
            token,
            poll_interval,
            #[cfg(feature = "secure-storage")]
            use_keyring,
            default,
        } => {
            #[cfg(feature = "secure-storage")]
            let use_keyring = *use_keyring;
            #[cfg(not(feature = "secure-storage"))]
            let use_keyring = false;

            let settings = ProfileSettings {
                subscription_id,
                endpoint,
                token: token.as_deref(),
                poll_interval: *poll_interval,
                use_keyring,
                make_default: *default,
            };
            handle_set(conn_mgr, name, settings)
        }
        ProfileCommands::Remove { name } => handle_remove(conn_mgr, name),
        ProfileCommands::Default { name } => handle_default(conn_mgr, name),
    }
}

fn config_path_display(conn_mgr: &ConnectionManager) -> Option<String> {
    conn_mgr
        .config_path
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .or_else(|| {
            Config::config_path()
                .ok()
                .map(|p| p.to_string_lossy().to_string())
        })
}

/// Token as shown to the user: keyring references verbatim, literals masked
fn display_token(token: Option<&str>) -> String {
    match token {
        None => "(from AZURE_ACCESS_TOKEN)".to_string(),
        Some(t) if CredentialStore::is_keyring_reference(t) => t.to_string(),
        Some(t) if t.len() > 8 => format!("{}...", t.chars().take(4).collect::<String>()),
        Some(_) => "***".to_string(),
    }
}

fn handle_list(conn_mgr: &ConnectionManager, output: CliOutputFormat) -> Result<()> {
    debug!("Listing all configured profiles");
    let profiles = conn_mgr.config.list_profiles();
    trace!("Found {} profiles", profiles.len());

    match OutputFormat::from(output) {
        OutputFormat::Human => {
            if let Some(path) = config_path_display(conn_mgr) {
                println!("Configuration file: {}", path);
            }
            if profiles.is_empty() {
                println!("No profiles configured.");
                println!("Use 'hdictl profile set' to create a profile.");
                return Ok(());
            }
            println!();
            for (name, profile) in profiles {
                let marker = if conn_mgr.config.default_profile.as_deref() == Some(name.as_str())
                {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<16} {}  {}",
                    marker, name, profile.subscription_id, profile.endpoint
                );
            }
        }
        format => {
            let list: Vec<_> = profiles
                .iter()
                .map(|(name, profile)| {
                    json!({
                        "name": name,
                        "subscription_id": profile.subscription_id,
                        "endpoint": profile.endpoint,
                        "is_default": conn_mgr.config.default_profile.as_deref() == Some(name.as_str()),
                    })
                })
                .collect();
            print_output(
                json!({
                    "config_path": config_path_display(conn_mgr),
                    "profiles": list,
                    "count": list.len(),
                }),
                format,
            )?;
        }
    }
    Ok(())
}

fn handle_path(conn_mgr: &ConnectionManager, output: CliOutputFormat) -> Result<()> {
    let path = config_path_display(conn_mgr).ok_or_else(|| {
        HdiCtlError::Configuration("could not determine configuration directory".to_string())
    })?;
    match OutputFormat::from(output) {
        OutputFormat::Human => println!("{}", path),
        format => print_output(json!({ "config_path": path }), format)?,
    }
    Ok(())
}

fn handle_show(conn_mgr: &ConnectionManager, name: &str, output: CliOutputFormat) -> Result<()> {
    let profile = conn_mgr
        .config
        .profiles
        .get(name)
        .ok_or_else(|| HdiCtlError::ProfileNotFound {
            name: name.to_string(),
        })?;
    let timeouts = profile.timeouts();
    let is_default = conn_mgr.config.default_profile.as_deref() == Some(name);

    match OutputFormat::from(output) {
        OutputFormat::Human => {
            println!("Profile: {}{}", name, if is_default { " (default)" } else { "" });
            println!("  subscription:  {}", profile.subscription_id);
            println!("  endpoint:      {}", profile.endpoint);
            println!("  token:         {}", display_token(profile.token.as_deref()));
            println!("  poll interval: {}s", profile.poll_interval().as_secs());
            println!(
                "  timeouts:      create {}s, read {}s, update {}s, delete {}s",
                timeouts.create.as_secs(),
                timeouts.read.as_secs(),
                timeouts.update.as_secs(),
                timeouts.delete.as_secs()
            );
        }
        format => print_output(
            json!({
                "name": name,
                "is_default": is_default,
                "subscription_id": profile.subscription_id,
                "endpoint": profile.endpoint,
                "token": display_token(profile.token.as_deref()),
                "poll_interval_secs": profile.poll_interval().as_secs(),
                "timeouts": timeouts,
            }),
            format,
        )?,
    }
    Ok(())
}

struct ProfileSettings<'a> {
    subscription_id: &'a str,
    endpoint: &'a str,
    token: Option<&'a str>,
    poll_interval: Option<u64>,
    use_keyring: bool,
    make_default: bool,
}

fn handle_set(conn_mgr: &ConnectionManager, name: &str, settings: ProfileSettings<'_>) -> Result<()> {
    debug!("Setting profile: {}", name);
    let mut config = conn_mgr.config.clone();
    let existing = config.profiles.get(name).cloned();

    let store = if settings.use_keyring {
        CredentialStore::new()
    } else {
        CredentialStore::plaintext()
    };

    let token = match settings.token {
        Some(value) => {
            if let Some(old) = existing.as_ref().and_then(|p| p.token.as_deref()) {
                store.delete_credential(old)?;
            }
            Some(store.store_credential(&format!("{}-token", name), value)?)
        }
        None => existing.as_ref().and_then(|p| p.token.clone()),
    };

    let profile = Profile {
        subscription_id: settings.subscription_id.to_string(),
        endpoint: settings.endpoint.to_string(),
        token,
        timeouts: existing.as_ref().and_then(|p| p.timeouts),
        poll_interval_secs: settings
            .poll_interval
            .or_else(|| existing.as_ref().and_then(|p| p.poll_interval_secs)),
    };
    config.set_profile(name.to_string(), profile);

    let first = config.profiles.len() == 1;
    if settings.make_default || first {
        config.default_profile = Some(name.to_string());
    }

    conn_mgr.save_config(&config)?;
    if existing.is_some() {
        println!("Profile '{}' updated.", name);
    } else {
        println!("Profile '{}' created.", name);
    }
    if config.default_profile.as_deref() == Some(name) {
        println!("'{}' is the default profile.", name);
    }
    Ok(())
}

fn handle_remove(conn_mgr: &ConnectionManager, name: &str) -> Result<()> {
    debug!("Removing profile: {}", name);
    let mut config = conn_mgr.config.clone();
    let removed = config
        .remove_profile(name)
        .ok_or_else(|| HdiCtlError::ProfileNotFound {
            name: name.to_string(),
        })?;

    if let Some(token) = removed.token.as_deref() {
        CredentialStore::new().delete_credential(token)?;
    }

    conn_mgr.save_config(&config)?;
    println!("Profile '{}' removed.", name);
    Ok(())
}

fn handle_default(conn_mgr: &ConnectionManager, name: &str) -> Result<()> {
    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(HdiCtlError::ProfileNotFound {
            name: name.to_string(),
        });
    }

    let mut config = conn_mgr.config.clone();
    config.default_profile = Some(name.to_string());
    conn_mgr.save_config(&config)?;

    println!("Default profile set to '{}'.", name);
    Ok(())
}
