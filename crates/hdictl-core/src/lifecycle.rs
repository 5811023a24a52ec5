//! Cluster lifecycle: Create, Read, Update, Delete
//!
//! These are methods on [`ResourceState`], which owns the persistent
//! identifier. Every call takes the [`OperationContext`] explicitly.
//!
//! ```text
//! Absent --create--> Creating --LRO ok--> Present
//! Creating --read (found / 404)--> Present / Absent
//! Present --read (404)--> Absent
//! Present --update (tags)--> Present
//! Present --delete--> Deleting --LRO ok / 404--> Absent
//! ```
//!
//! A create that fails after the PUT was accepted stays `Creating` with the
//! desired tree as its snapshot; the next read resolves it by name.
//!
//! Only tags change in place. Everything else is force-replacement and is
//! handled by [`plan`] + delete/create in the caller.

use tracing::{debug, info, warn};

use crate::api::OperationHandle;
use crate::context::{OperationContext, Scope};
use crate::error::{CoreError, OperationKind, Result};
use crate::expand::{expand_cluster, expand_patch};
use crate::flatten::{flatten_cluster, normalize_location};
use crate::id::ResourceId;
use crate::lro::wait_for_completion;
use crate::models::Cluster;
use crate::state::{Phase, ResourceState};
use crate::tree::ClusterConfig;

impl ResourceState {
    /// Create the cluster described by `config` and wait for it to be ready.
    ///
    /// Validation happens before any remote call. A conflict on submit or in
    /// the operation's terminal fault becomes [`CoreError::NameConflict`].
    /// On success the canonical identifier is stored and the flattened tree
    /// returned. Any other failure after the PUT was accepted leaves the state
    /// `Creating` for [`ResourceState::read`] to resolve.
    pub async fn create(
        &mut self,
        ctx: &OperationContext,
        config: &ClusterConfig,
    ) -> Result<ClusterConfig> {
        if let Some(id) = &self.id {
            return Err(CoreError::State(format!(
                "cluster {:?} is already managed as {} ({:?})",
                config.name, id, self.phase
            )));
        }
        if self.phase == Phase::Creating {
            return Err(CoreError::State(format!(
                "an earlier create of cluster {:?} did not finish; read it before retrying",
                config.name
            )));
        }

        let request = expand_cluster(config)?;
        let scope = ctx.scope(OperationKind::Create, &config.name);
        let rg = config.resource_group_name.as_str();
        let name = config.name.as_str();

        info!(
            cluster = %config.name,
            resource_group = %config.resource_group_name,
            kind = %request.properties.cluster_definition.kind,
            roles = request.properties.compute_profile.roles.len(),
            "Creating HDInsight cluster"
        );

        let handle = match ctx.call(&scope, ctx.api().create(rg, name, &request)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) if e.is_conflict() => {
                return Err(CoreError::NameConflict {
                    name: name.to_string(),
                });
            }
            Ok(Err(e)) => return Err(CoreError::infrastructure(OperationKind::Create, name, e)),
            // Cancelled before the request was answered: it may still have landed
            Err(e) => {
                self.set_creating(config.clone());
                return Err(e);
            }
        };

        // Accepted: from here on the cluster may exist remotely
        self.set_creating(config.clone());

        match self.finish_create(ctx, &scope, config, handle).await {
            Err(CoreError::OperationFailed { ref fault, .. }) if fault.is_conflict() => {
                self.clear();
                Err(CoreError::NameConflict {
                    name: name.to_string(),
                })
            }
            Err(e) => {
                warn!(
                    cluster = %name,
                    "Create did not complete; state kept as creating until the next read: {}",
                    e
                );
                Err(e)
            }
            Ok(tree) => Ok(tree),
        }
    }

    async fn finish_create(
        &mut self,
        ctx: &OperationContext,
        scope: &Scope,
        config: &ClusterConfig,
        handle: Option<OperationHandle>,
    ) -> Result<ClusterConfig> {
        let rg = config.resource_group_name.as_str();
        let name = config.name.as_str();

        if let Some(handle) = handle {
            wait_for_completion(ctx, scope, &handle).await?;
        }

        let cluster = fetch(ctx, scope, rg, name).await?;
        let id = canonical_id(&cluster, OperationKind::Create, name)?;
        let parsed = ResourceId::parse(&id)?;
        let tree = flatten_cluster(&cluster, &parsed, Some(config));

        info!(cluster = %name, id = %id, "Created HDInsight cluster");
        self.set_present(id, tree.clone());
        Ok(tree)
    }

    /// Refresh from the remote side.
    ///
    /// Returns `Ok(None)` and forgets the identifier when the cluster no
    /// longer exists (drift). Other failures leave the state untouched.
    ///
    /// An unfinished create (`Creating` without an identifier) is looked up
    /// by the resource group and name of its snapshot.
    pub async fn read(&mut self, ctx: &OperationContext) -> Result<Option<ClusterConfig>> {
        let Some(handle) = self.id.clone() else {
            if self.phase == Phase::Creating {
                return self.resolve_creating(ctx).await;
            }
            debug!("No identifier stored, nothing to read");
            return Ok(None);
        };
        let id = ResourceId::parse(&handle)?;
        let scope = ctx.scope(OperationKind::Read, &id.name);

        let cluster = match ctx
            .call(&scope, ctx.api().get(&id.resource_group, &id.name))
            .await?
        {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                info!(id = %handle, "HDInsight cluster no longer exists - removing from state");
                self.clear();
                return Ok(None);
            }
            Err(e) => return Err(CoreError::infrastructure(OperationKind::Read, &id.name, e)),
        };

        let tree = flatten_cluster(&cluster, &id, self.snapshot.as_ref());
        self.set_present(handle, tree.clone());
        Ok(Some(tree))
    }

    async fn resolve_creating(&mut self, ctx: &OperationContext) -> Result<Option<ClusterConfig>> {
        let Some(desired) = self.snapshot.clone() else {
            self.clear();
            return Ok(None);
        };
        let rg = desired.resource_group_name.as_str();
        let name = desired.name.as_str();
        let scope = ctx.scope(OperationKind::Read, name);

        let cluster = match ctx.call(&scope, ctx.api().get(rg, name)).await? {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                info!(cluster = %name, "Unfinished create left no cluster behind");
                self.clear();
                return Ok(None);
            }
            Err(e) => return Err(CoreError::infrastructure(OperationKind::Read, name, e)),
        };

        let id = canonical_id(&cluster, OperationKind::Read, name)?;
        let parsed = ResourceId::parse(&id)?;
        let tree = flatten_cluster(&cluster, &parsed, Some(&desired));
        info!(
            cluster = %name,
            id = %id,
            provisioning_state = ?cluster.properties.as_ref().and_then(|p| p.provisioning_state.as_deref()),
            "Resolved unfinished create"
        );
        self.set_present(id, tree.clone());
        Ok(Some(tree))
    }

    /// Send tag changes. Tag patches are synchronous; the cluster is
    /// re-fetched afterwards to confirm.
    pub async fn update(
        &mut self,
        ctx: &OperationContext,
        config: &ClusterConfig,
    ) -> Result<ClusterConfig> {
        let handle = self.id.clone().ok_or_else(|| {
            CoreError::State(format!(
                "cluster {:?} has no stored identifier; create or import it first",
                config.name
            ))
        })?;
        let id = ResourceId::parse(&handle)?;

        if let Some(prior) = &self.snapshot {
            let fields = replacement_fields(prior, config);
            if !fields.is_empty() {
                warn!(
                    cluster = %id.name,
                    ?fields,
                    "Ignoring changes that require replacing the cluster"
                );
            }
        }

        let patch = expand_patch(config)?;
        let scope = ctx.scope(OperationKind::Update, &id.name);

        info!(cluster = %id.name, tags = patch.tags.len(), "Updating HDInsight cluster tags");
        ctx.call(
            &scope,
            ctx.api().update(&id.resource_group, &id.name, &patch),
        )
        .await?
        .map_err(|e| CoreError::infrastructure(OperationKind::Update, &id.name, e))?;

        let cluster = fetch(ctx, &scope, &id.resource_group, &id.name).await?;
        let prior = self.snapshot.clone().unwrap_or_else(|| config.clone());
        let tree = flatten_cluster(&cluster, &id, Some(&prior));
        self.set_present(handle, tree.clone());
        Ok(tree)
    }

    /// Delete the cluster and wait for it to be gone.
    ///
    /// Not-found at any point counts as success. If the wait is cancelled
    /// the state stays `Deleting` with the identifier kept, so a later read
    /// can resolve what happened.
    pub async fn delete(&mut self, ctx: &OperationContext) -> Result<()> {
        let Some(handle) = self.id.clone() else {
            debug!("No identifier stored, nothing to delete");
            self.clear();
            return Ok(());
        };
        let id = ResourceId::parse(&handle)?;
        let scope = ctx.scope(OperationKind::Delete, &id.name);

        info!(id = %handle, "Deleting HDInsight cluster");
        self.set_phase(Phase::Deleting);

        let submitted = match ctx
            .call(&scope, ctx.api().delete(&id.resource_group, &id.name))
            .await?
        {
            Ok(submitted) => submitted,
            Err(e) if e.is_not_found() => {
                info!(id = %handle, "HDInsight cluster already deleted");
                self.clear();
                return Ok(());
            }
            Err(e) => {
                self.set_phase(Phase::Present);
                return Err(CoreError::infrastructure(OperationKind::Delete, &id.name, e));
            }
        };

        if let Some(operation) = submitted {
            wait_for_delete(ctx, &scope, &operation).await?;
        }

        info!(id = %handle, "Deleted HDInsight cluster");
        self.clear();
        Ok(())
    }

    /// Adopt an existing cluster by identifier.
    ///
    /// Unlike [`ResourceState::read`], a missing cluster is an error here.
    pub async fn import(&mut self, ctx: &OperationContext, handle: &str) -> Result<ClusterConfig> {
        let id = ResourceId::parse(handle)?;
        let mut candidate = ResourceState::from_id(handle);
        match candidate.read(ctx).await? {
            Some(tree) => {
                *self = candidate;
                Ok(tree)
            }
            None => Err(CoreError::NotFound {
                resource: id.to_string(),
            }),
        }
    }
}

async fn wait_for_delete(
    ctx: &OperationContext,
    scope: &Scope,
    operation: &OperationHandle,
) -> Result<()> {
    match wait_for_completion(ctx, scope, operation).await {
        Err(CoreError::Infrastructure { ref source, .. }) if source.is_not_found() => Ok(()),
        other => other,
    }
}

async fn fetch(ctx: &OperationContext, scope: &Scope, rg: &str, name: &str) -> Result<Cluster> {
    ctx.call(scope, ctx.api().get(rg, name))
        .await?
        .map_err(|e| CoreError::infrastructure(scope.operation, name, e))
}

fn canonical_id(cluster: &Cluster, operation: OperationKind, name: &str) -> Result<String> {
    cluster.id.clone().filter(|id| !id.is_empty()).ok_or_else(|| {
        CoreError::infrastructure(
            operation,
            name,
            crate::api::ApiError::Decode("cluster response has no id".to_string()),
        )
    })
}

/// Read-only lookup by resource group and name. Does not touch any state.
pub async fn lookup(
    ctx: &OperationContext,
    resource_group: &str,
    name: &str,
) -> Result<ClusterConfig> {
    let scope = ctx.scope(OperationKind::Read, name);
    let cluster = match ctx.call(&scope, ctx.api().get(resource_group, name)).await? {
        Ok(cluster) => cluster,
        Err(e) if e.is_not_found() => {
            return Err(CoreError::NotFound {
                resource: format!("{}/{}", resource_group, name),
            });
        }
        Err(e) => return Err(CoreError::infrastructure(OperationKind::Read, name, e)),
    };

    let id = match cluster.id.as_deref() {
        Some(handle) => ResourceId::parse(handle)?,
        None => ResourceId::new("", resource_group, name),
    };
    Ok(flatten_cluster(&cluster, &id, None))
}

/// What it takes to move from the stored state to `desired`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Create,
    /// Force-replacement fields changed: delete, then create
    Replace { fields: Vec<&'static str> },
    UpdateTags,
    NoChange,
}

/// Compare `desired` against the last snapshot
pub fn plan(state: &ResourceState, desired: &ClusterConfig) -> Plan {
    if state.id.is_none() {
        return Plan::Create;
    }
    let Some(prior) = &state.snapshot else {
        return Plan::UpdateTags;
    };

    let fields = replacement_fields(prior, desired);
    if !fields.is_empty() {
        Plan::Replace { fields }
    } else if prior.tags != desired.tags {
        Plan::UpdateTags
    } else {
        Plan::NoChange
    }
}

/// Force-replacement fields that differ between `prior` and `desired`.
///
/// Write-only values the snapshot does not know (after an import, say) are
/// not counted as changes.
pub fn replacement_fields(prior: &ClusterConfig, desired: &ClusterConfig) -> Vec<&'static str> {
    let desired = &without_unknown_secrets(prior, desired);
    let mut fields = Vec::new();

    if prior.name != desired.name {
        fields.push("name");
    }
    if !prior
        .resource_group_name
        .eq_ignore_ascii_case(&desired.resource_group_name)
    {
        fields.push("resource_group_name");
    }
    if normalize_location(&prior.location) != normalize_location(&desired.location) {
        fields.push("location");
    }
    if !version_matches(&desired.cluster_version, &prior.cluster_version) {
        fields.push("cluster_version");
    }
    if prior.os_type != desired.os_type {
        fields.push("os_type");
    }
    if prior.tier != desired.tier {
        fields.push("tier");
    }

    let definition = |c: &ClusterConfig| {
        c.cluster_definition
            .as_ref()
            .map(|d| (d.kind.to_lowercase(), d.configurations.clone()))
    };
    if definition(prior) != definition(desired) {
        fields.push("cluster_definition");
    }

    let roles = |c: &ClusterConfig| {
        c.compute_profile.as_ref().map(|p| {
            let mut roles = p.role.clone();
            roles.sort_by(|a, b| a.name.cmp(&b.name));
            roles
        })
    };
    if roles(prior) != roles(desired) {
        fields.push("compute_profile");
    }

    if prior.security_profile != desired.security_profile {
        fields.push("security_profile");
    }

    fields
}

/// `desired` with each write-only value replaced by the snapshot's when the
/// snapshot has none
fn without_unknown_secrets(prior: &ClusterConfig, desired: &ClusterConfig) -> ClusterConfig {
    let mut desired = desired.clone();

    if let (Some(known), Some(definition)) =
        (&prior.cluster_definition, desired.cluster_definition.as_mut())
        && known.configurations.is_empty()
    {
        definition.configurations.clear();
    }

    if let Some(profile) = desired.compute_profile.as_mut() {
        for role in &mut profile.role {
            let known = prior
                .compute_profile
                .as_ref()
                .and_then(|p| p.find_role(&role.name))
                .and_then(|r| r.os_profile.as_ref());
            if let (Some(known), Some(os)) = (known, role.os_profile.as_mut()) {
                if known.password.is_none() {
                    os.password = None;
                }
                if known.ssh_keys.is_empty() {
                    os.ssh_keys.clear();
                }
            }
        }
    }

    if let (Some(known), Some(security)) =
        (&prior.security_profile, desired.security_profile.as_mut())
        && known.domain_user_password.is_empty()
    {
        security.domain_user_password.clear();
    }

    desired
}

/// `3.6` matches the full build `3.6.1000.67` the API reports
fn version_matches(desired: &str, actual: &str) -> bool {
    actual == desired
        || actual
            .strip_prefix(desired)
            .is_some_and(|rest| rest.starts_with('.'))
}
