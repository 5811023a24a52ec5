//! Persisted state: the cluster identifier and its last flattened snapshot
//!
//! The state file is JSON, keyed by `{resource_group}/{name}`. The snapshot
//! is what the planner diffs against; the remote API stays the source of
//! truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::tree::ClusterConfig;

const STATE_VERSION: u32 = 1;

/// Where a cluster is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Absent,
    Creating,
    Present,
    Deleting,
}

/// State of one managed cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Canonical ARM resource ID, stored verbatim after create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ClusterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ResourceState {
    /// State for an existing cluster known only by its identifier
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            phase: Phase::Present,
            snapshot: None,
            updated_at: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.id.is_some() && self.phase == Phase::Present
    }

    /// Anything worth keeping in the state file, including an unfinished create
    pub fn is_tracked(&self) -> bool {
        self.id.is_some() || self.phase != Phase::Absent
    }

    /// Create was accepted but not confirmed; `desired` is what was sent
    pub(crate) fn set_creating(&mut self, desired: ClusterConfig) {
        self.id = None;
        self.phase = Phase::Creating;
        self.snapshot = Some(desired);
        self.touch();
    }

    pub(crate) fn set_present(&mut self, id: String, snapshot: ClusterConfig) {
        self.id = Some(id);
        self.phase = Phase::Present;
        self.snapshot = Some(snapshot);
        self.touch();
    }

    /// Forget the cluster (confirmed deletion or out-of-band disappearance)
    pub(crate) fn clear(&mut self) {
        self.id = None;
        self.phase = Phase::Absent;
        self.snapshot = None;
        self.touch();
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// On-disk collection of cluster states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load from `path`; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::State(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            CoreError::State(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        if state.version > STATE_VERSION {
            return Err(CoreError::State(format!(
                "{} was written by a newer version (state version {})",
                path.display(),
                state.version
            )));
        }
        Ok(state)
    }

    /// Write atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::State(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::State(format!("Failed to serialize state: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| {
            CoreError::State(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            CoreError::State(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    /// Take the state for `key` out for a lifecycle call; put it back with [`StateFile::put`]
    pub fn take(&mut self, key: &str) -> ResourceState {
        self.resources.remove(key).unwrap_or_default()
    }

    /// Store `state` under `key`; absent clusters are dropped from the file
    pub fn put(&mut self, key: String, state: ResourceState) {
        if !state.is_tracked() {
            self.resources.remove(&key);
        } else {
            self.resources.insert(key, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(&dir.path().join("state.json")).unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = StateFile::default();
        state.put(
            "rg1/cluster1".to_string(),
            ResourceState::from_id(
                "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/cluster1",
            ),
        );
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.get("rg1/cluster1").unwrap().is_present());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_put_absent_removes_entry() {
        let mut state = StateFile::default();
        state.put("rg1/c".to_string(), ResourceState::from_id("/x"));
        let mut taken = state.take("rg1/c");
        assert!(state.get("rg1/c").is_none());

        taken.clear();
        state.put("rg1/c".to_string(), taken);
        assert!(state.get("rg1/c").is_none());
    }

    #[test]
    fn test_unfinished_create_is_kept() {
        let mut state = StateFile::default();
        let mut creating = ResourceState::default();
        creating.set_creating(crate::expand::tests::sample_config());
        assert!(creating.is_tracked());

        state.put("rg1/cluster1".to_string(), creating);
        let kept = state.get("rg1/cluster1").unwrap();
        assert_eq!(kept.phase, Phase::Creating);
        assert!(kept.id.is_none());
        assert!(kept.snapshot.is_some());
    }

    #[test]
    fn test_corrupt_file_is_state_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = StateFile::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::State(_)));
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"version": 99, "resources": {}}"#).unwrap();
        assert!(StateFile::load(&path).is_err());
    }
}
