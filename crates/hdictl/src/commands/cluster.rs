//! Cluster lifecycle commands
//!
//! Each mutating command takes the cluster's entry out of the state file,
//! runs the lifecycle call and writes the entry back whatever the outcome,
//! so a failed or interrupted wait still records `creating`/`deleting`.

use crate::cli::OutputFormat as CliOutputFormat;
use crate::connection::ConnectionManager;
use crate::error::{HdiCtlError, Result};
use crate::output::{OutputFormat, print_cluster, print_output};
use hdictl_core::expand::expand_cluster;
use hdictl_core::id::state_key;
use hdictl_core::{
    ClusterConfig, CoreError, OperationContext, Plan, ResourceId, ResourceState, StateFile, lookup, plan,
};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parse a cluster definition; the format follows the extension, TOML by default
pub fn read_cluster_file(path: &Path) -> Result<ClusterConfig> {
    debug!("Reading cluster definition from {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| HdiCtlError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let parsed = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        _ => toml::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| HdiCtlError::FileError {
        path: path.display().to_string(),
        message,
    })
}

/// State file plus where it lives
struct StateStore {
    file: StateFile,
    path: PathBuf,
}

impl StateStore {
    fn open(conn_mgr: &ConnectionManager) -> Result<Self> {
        let (file, path) = conn_mgr.load_state()?;
        Ok(Self { file, path })
    }

    fn take(&mut self, key: &str) -> ResourceState {
        self.file.take(key)
    }

    fn is_managed(&self, key: &str) -> bool {
        self.file.get(key).is_some_and(|s| s.is_tracked())
    }

    fn commit(&mut self, key: &str, state: &ResourceState) -> Result<()> {
        self.file.put(key.to_string(), state.clone());
        self.file.save(&self.path)?;
        debug!("State for {} saved to {}", key, self.path.display());
        Ok(())
    }
}

pub fn handle_expand(file: &Path, output: CliOutputFormat) -> Result<()> {
    let config = read_cluster_file(file)?;
    let request = expand_cluster(&config).map_err(CoreError::from)?;

    let mut body = serde_json::to_value(&request)?;
    mask_secrets(&mut body);
    print_output(body, output.into())?;
    Ok(())
}

pub fn handle_plan(
    conn_mgr: &ConnectionManager,
    file: &Path,
    output: CliOutputFormat,
) -> Result<()> {
    let desired = read_cluster_file(file)?;
    // Surface validation problems before reporting a plan
    expand_cluster(&desired).map_err(CoreError::from)?;

    let key = state_key(&desired.resource_group_name, &desired.name);
    let store = StateStore::open(conn_mgr)?;
    let current = store.file.get(&key).cloned().unwrap_or_default();
    let planned = plan(&current, &desired);

    match OutputFormat::from(output) {
        OutputFormat::Human => println!("{}", describe_plan(&desired.name, &planned)),
        format => print_output(plan_json(&desired.name, &planned), format)?,
    }
    Ok(())
}

pub async fn handle_apply(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    file: &Path,
    allow_replace: bool,
    output: CliOutputFormat,
) -> Result<()> {
    let desired = read_cluster_file(file)?;
    let key = state_key(&desired.resource_group_name, &desired.name);
    let ctx = conn_mgr.context(profile)?;

    let mut store = StateStore::open(conn_mgr)?;
    let mut state = store.take(&key);
    let result = apply(&ctx, &mut store, &key, &mut state, &desired, allow_replace).await;
    store.commit(&key, &state)?;

    print_cluster(&result?, output.into())?;
    Ok(())
}

async fn apply(
    ctx: &OperationContext,
    store: &mut StateStore,
    key: &str,
    state: &mut ResourceState,
    desired: &ClusterConfig,
    allow_replace: bool,
) -> Result<ClusterConfig> {
    if state.is_tracked() {
        debug!("Refreshing {} before planning", key);
        state.read(ctx).await?;
    }

    let planned = plan(state, desired);
    info!("{}", describe_plan(&desired.name, &planned));

    let tree = match planned {
        Plan::Create => state.create(ctx, desired).await?,
        Plan::UpdateTags => state.update(ctx, desired).await?,
        Plan::NoChange => state.snapshot.clone().unwrap_or_else(|| desired.clone()),
        Plan::Replace { fields } => {
            if !allow_replace {
                return Err(HdiCtlError::ReplacementRequired {
                    name: desired.name.clone(),
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                });
            }
            warn!(
                cluster = %desired.name,
                fields = ?fields,
                "Replacing cluster: deleting before re-creating"
            );
            state.delete(ctx).await?;
            store.commit(key, state)?;
            state.create(ctx, desired).await?
        }
    };
    Ok(tree)
}

pub async fn handle_create(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    file: &Path,
    output: CliOutputFormat,
) -> Result<()> {
    let desired = read_cluster_file(file)?;
    let key = state_key(&desired.resource_group_name, &desired.name);
    let ctx = conn_mgr.context(profile)?;

    let mut store = StateStore::open(conn_mgr)?;
    let mut state = store.take(&key);
    let result = state.create(&ctx, &desired).await;
    store.commit(&key, &state)?;

    print_cluster(&result?, output.into())?;
    Ok(())
}

pub async fn handle_read(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    resource_group: &str,
    name: &str,
    output: CliOutputFormat,
) -> Result<()> {
    let key = state_key(resource_group, name);
    let mut store = StateStore::open(conn_mgr)?;
    if !store.is_managed(&key) {
        return Err(HdiCtlError::NotManaged {
            name: name.to_string(),
        });
    }
    let ctx = conn_mgr.context(profile)?;

    let mut state = store.take(&key);
    let result = state.read(&ctx).await;
    store.commit(&key, &state)?;

    match result? {
        Some(tree) => print_cluster(&tree, output.into())?,
        None => match OutputFormat::from(output) {
            OutputFormat::Human => {
                println!("Cluster '{}' no longer exists; removed from state.", name)
            }
            format => print_output(json!({"name": name, "exists": false}), format)?,
        },
    }
    Ok(())
}

pub async fn handle_update(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    file: &Path,
    output: CliOutputFormat,
) -> Result<()> {
    let desired = read_cluster_file(file)?;
    let key = state_key(&desired.resource_group_name, &desired.name);
    let mut store = StateStore::open(conn_mgr)?;
    if !store.is_managed(&key) {
        return Err(HdiCtlError::NotManaged {
            name: desired.name.clone(),
        });
    }
    let ctx = conn_mgr.context(profile)?;

    let mut state = store.take(&key);
    let result = state.update(&ctx, &desired).await;
    store.commit(&key, &state)?;

    print_cluster(&result?, output.into())?;
    Ok(())
}

pub async fn handle_delete(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    resource_group: &str,
    name: &str,
    output: CliOutputFormat,
) -> Result<()> {
    let key = state_key(resource_group, name);
    let mut store = StateStore::open(conn_mgr)?;
    if !store.is_managed(&key) {
        return Err(HdiCtlError::NotManaged {
            name: name.to_string(),
        });
    }
    let ctx = conn_mgr.context(profile)?;

    let mut state = store.take(&key);
    let result = state.delete(&ctx).await;
    store.commit(&key, &state)?;
    result?;

    match OutputFormat::from(output) {
        OutputFormat::Human => println!("Cluster '{}' deleted.", name),
        format => print_output(json!({"name": name, "deleted": true}), format)?,
    }
    Ok(())
}

pub async fn handle_import(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    handle: &str,
    output: CliOutputFormat,
) -> Result<()> {
    let id = ResourceId::parse(handle)?;
    let key = id.state_key();
    let mut store = StateStore::open(conn_mgr)?;
    if store.is_managed(&key) {
        return Err(HdiCtlError::State {
            message: format!("cluster '{}' is already managed in this state file", key),
        });
    }
    let ctx = conn_mgr.context(profile)?;

    let mut state = ResourceState::default();
    let tree = state.import(&ctx, handle).await?;
    store.commit(&key, &state)?;
    info!("Imported {}", id);

    print_cluster(&tree, output.into())?;
    Ok(())
}

pub async fn handle_get(
    conn_mgr: &ConnectionManager,
    profile: Option<&str>,
    resource_group: &str,
    name: &str,
    output: CliOutputFormat,
) -> Result<()> {
    let ctx = conn_mgr.context(profile)?;
    let tree = lookup(&ctx, resource_group, name).await?;
    print_cluster(&tree, output.into())?;
    Ok(())
}

fn describe_plan(name: &str, planned: &Plan) -> String {
    match planned {
        Plan::Create => format!("Cluster '{}' will be created.", name),
        Plan::Replace { fields } => format!(
            "Cluster '{}' must be replaced (changed: {}).",
            name,
            fields.join(", ")
        ),
        Plan::UpdateTags => format!("Cluster '{}' tags will be updated in place.", name),
        Plan::NoChange => format!("Cluster '{}' is up to date.", name),
    }
}

fn plan_json(name: &str, planned: &Plan) -> Value {
    let (action, fields) = match planned {
        Plan::Create => ("create", Vec::new()),
        Plan::Replace { fields } => ("replace", fields.clone()),
        Plan::UpdateTags => ("update", Vec::new()),
        Plan::NoChange => ("none", Vec::new()),
    };
    json!({
        "name": name,
        "action": action,
        "replace_fields": fields,
    })
}

/// Mask every string under a key that looks like a password
fn mask_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if key.to_ascii_lowercase().contains("password") && inner.is_string() {
                    *inner = Value::String("***".to_string());
                } else {
                    mask_secrets(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mask_secrets_nested() {
        let mut body = json!({
            "properties": {
                "clusterDefinition": {
                    "configurations": {
                        "gateway": {
                            "restAuthCredential.username": "admin",
                            "restAuthCredential.password": "hunter2"
                        }
                    }
                },
                "computeProfile": {
                    "roles": [{
                        "osProfile": {"linuxOperatingSystemProfile": {"username": "u", "password": "p"}}
                    }]
                }
            }
        });
        mask_secrets(&mut body);

        let gateway = &body["properties"]["clusterDefinition"]["configurations"]["gateway"];
        assert_eq!(gateway["restAuthCredential.password"], "***");
        assert_eq!(gateway["restAuthCredential.username"], "admin");
        let linux = &body["properties"]["computeProfile"]["roles"][0]["osProfile"]
            ["linuxOperatingSystemProfile"];
        assert_eq!(linux["password"], "***");
    }

    #[test]
    fn test_plan_json() {
        let value = plan_json(
            "c1",
            &Plan::Replace {
                fields: vec!["tier"],
            },
        );
        assert_eq!(value["action"], "replace");
        assert_eq!(value["replace_fields"][0], "tier");
        assert_eq!(plan_json("c1", &Plan::NoChange)["action"], "none");
    }

    #[test]
    fn test_read_cluster_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "name: c1\nresource_group_name: rg1\nlocation: westeurope\ncluster_version: '3.6'\nos_type: Linux\ntier: Standard"
        )
        .unwrap();

        let config = read_cluster_file(file.path()).unwrap();
        assert_eq!(config.name, "c1");
        assert_eq!(config.cluster_version, "3.6");
    }

    #[test]
    fn test_read_cluster_file_reports_path() {
        let err = read_cluster_file(Path::new("/nonexistent/cluster.toml")).unwrap_err();
        assert!(matches!(err, HdiCtlError::FileError { .. }));
        assert!(err.to_string().contains("/nonexistent/cluster.toml"));
    }
}
