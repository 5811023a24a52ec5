//! Cluster identifiers
//!
//! The persistent handle of a cluster is its ARM resource ID:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.HDInsight/clusters/{name}
//! ```

use std::fmt;

use crate::error::{CoreError, Result};

pub const PROVIDER_NAMESPACE: &str = "Microsoft.HDInsight";
pub const COLLECTION: &str = "clusters";

/// Parsed cluster resource ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Parse a resource ID into its subscription, resource group and name.
    ///
    /// The path is read as `key/value` pairs. `resourceGroups` is matched
    /// case-insensitively since ARM returns both casings.
    ///
    /// ```
    /// use hdictl_core::ResourceId;
    ///
    /// let id = ResourceId::parse(
    ///     "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/cluster1",
    /// )
    /// .unwrap();
    /// assert_eq!(id.resource_group, "rg1");
    /// assert_eq!(id.name, "cluster1");
    /// ```
    pub fn parse(handle: &str) -> Result<Self> {
        let path = handle
            .strip_prefix('/')
            .ok_or_else(|| CoreError::malformed(handle, "expected a leading '/'"))?;
        let path = path.strip_suffix('/').unwrap_or(path);

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(CoreError::malformed(
                handle,
                "expected an even number of key/value segments",
            ));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut name = None;

        for (idx, pair) in segments.chunks(2).enumerate() {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(CoreError::malformed(handle, "empty path segment"));
            }

            if key.eq_ignore_ascii_case("subscriptions") {
                subscription_id = Some(value);
            } else if key.eq_ignore_ascii_case("resourceGroups") {
                resource_group = Some(value);
            } else if key.eq_ignore_ascii_case(COLLECTION) {
                // The cluster must be the last pair; nested resources are not clusters
                if idx != segments.len() / 2 - 1 {
                    return Err(CoreError::malformed(
                        handle,
                        "'clusters/{name}' must be the final segment",
                    ));
                }
                if resource_group.is_none() {
                    return Err(CoreError::malformed(
                        handle,
                        "'resourceGroups' must precede 'clusters'",
                    ));
                }
                name = Some(value);
            }
        }

        let subscription_id = subscription_id
            .ok_or_else(|| CoreError::malformed(handle, "no 'subscriptions' segment"))?;
        let resource_group = resource_group
            .ok_or_else(|| CoreError::malformed(handle, "no 'resourceGroups' segment"))?;
        let name = name.ok_or_else(|| CoreError::malformed(handle, "no 'clusters' segment"))?;

        Ok(Self::new(subscription_id, resource_group, name))
    }

    /// Key used for this cluster in the state file
    pub fn state_key(&self) -> String {
        state_key(&self.resource_group, &self.name)
    }
}

/// `{resource_group}/{name}`, case preserved
pub fn state_key(resource_group: &str, name: &str) -> String {
    format!("{}/{}", resource_group, name)
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, PROVIDER_NAMESPACE, COLLECTION, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str =
        "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/cluster1";

    #[test]
    fn test_parse_canonical() {
        let id = ResourceId::parse(ID).unwrap();
        assert_eq!(id.subscription_id, "0000");
        assert_eq!(id.resource_group, "rg1");
        assert_eq!(id.name, "cluster1");
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn test_parse_lowercase_resource_groups() {
        let id = ResourceId::parse(
            "/subscriptions/0000/resourcegroups/RG1/providers/Microsoft.HDInsight/clusters/c",
        )
        .unwrap();
        assert_eq!(id.resource_group, "RG1");
    }

    #[test]
    fn test_parse_trailing_slash() {
        let id = ResourceId::parse(&format!("{}/", ID)).unwrap();
        assert_eq!(id.name, "cluster1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "subscriptions/0000/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/c",
            "/subscriptions/0000/resourceGroups/rg1",
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters",
            "/subscriptions/0000/resourceGroups//providers/Microsoft.HDInsight/clusters/c",
            "/subscriptions/0000/providers/Microsoft.HDInsight/clusters/c",
            "/subscriptions/0000/providers/Microsoft.HDInsight/clusters/c/resourceGroups/rg1",
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/c/applications/a",
        ] {
            let err = ResourceId::parse(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedIdentifier { .. }),
                "{bad:?} should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn test_state_key() {
        let id = ResourceId::new("s", "rg1", "cluster1");
        assert_eq!(id.state_key(), "rg1/cluster1");
    }
}
