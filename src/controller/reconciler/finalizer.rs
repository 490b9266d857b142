//! # Finalizer
//!
//! Keeps the `ClusterUser` finalizer in place until the user's certificate
//! objects have been cleaned up.

use crate::constants::{FIELD_MANAGER, USER_FINALIZER};
use crate::crd::ClusterUser;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::debug;

/// Finalizer list with ours appended, or `None` when it is already present
#[must_use]
pub fn with_finalizer(finalizers: Option<&[String]>) -> Option<Vec<String>> {
    let mut finalizers = finalizers.map(<[String]>::to_vec).unwrap_or_default();
    if finalizers.iter().any(|f| f == USER_FINALIZER) {
        return None;
    }
    finalizers.push(USER_FINALIZER.to_string());
    Some(finalizers)
}

/// Finalizer list with ours removed, or `None` when it was not present
#[must_use]
pub fn without_finalizer(finalizers: Option<&[String]>) -> Option<Vec<String>> {
    let finalizers = finalizers?;
    if !finalizers.iter().any(|f| f == USER_FINALIZER) {
        return None;
    }
    Some(
        finalizers
            .iter()
            .filter(|f| *f != USER_FINALIZER)
            .cloned()
            .collect(),
    )
}

/// True when the user still carries our finalizer
#[must_use]
pub fn has_finalizer(user: &ClusterUser) -> bool {
    user.metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|f| f == USER_FINALIZER))
}

pub async fn add_finalizer(client: &Client, namespace: &str, name: &str) -> Result<(), kube::Error> {
    let api: Api<ClusterUser> = Api::namespaced(client.clone(), namespace);

    // Re-read so concurrent finalizers from other controllers are kept
    let user = api.get(name).await?;
    let Some(finalizers) = with_finalizer(user.metadata.finalizers.as_deref()) else {
        return Ok(());
    };

    let patch = finalizer_patch(&finalizers, user.metadata.resource_version.as_deref());
    patch_finalizers(&api, name, &patch).await?;
    debug!(resource.name = name, resource.namespace = namespace, "Added finalizer");
    Ok(())
}

pub async fn remove_finalizer(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<(), kube::Error> {
    let api: Api<ClusterUser> = Api::namespaced(client.clone(), namespace);

    let user = match api.get(name).await {
        Ok(user) => user,
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => return Ok(()),
        Err(e) => return Err(e),
    };
    let Some(finalizers) = without_finalizer(user.metadata.finalizers.as_deref()) else {
        return Ok(());
    };

    let patch = finalizer_patch(&finalizers, user.metadata.resource_version.as_deref());
    patch_finalizers(&api, name, &patch).await?;
    debug!(resource.name = name, resource.namespace = namespace, "Removed finalizer");
    Ok(())
}

/// Merge patch replacing the finalizer list
///
/// Carries the resource version of the read it was computed from, so the API
/// server rejects it with a conflict if the list changed in between.
#[must_use]
pub fn finalizer_patch(finalizers: &[String], resource_version: Option<&str>) -> serde_json::Value {
    let mut metadata = serde_json::json!({ "finalizers": finalizers });
    if let Some(version) = resource_version {
        metadata["resourceVersion"] = serde_json::Value::String(version.to_string());
    }
    serde_json::json!({ "metadata": metadata })
}

async fn patch_finalizers(
    api: &Api<ClusterUser>,
    name: &str,
    patch: &serde_json::Value,
) -> Result<(), kube::Error> {
    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ClusterUserSpec;

    #[test]
    fn test_with_finalizer_appends_once() {
        let existing = vec!["other.io/cleanup".to_string()];

        let added = with_finalizer(Some(existing.as_slice())).expect("finalizer should be added");
        assert_eq!(added, vec!["other.io/cleanup".to_string(), USER_FINALIZER.to_string()]);

        assert!(with_finalizer(Some(added.as_slice())).is_none());
        assert_eq!(with_finalizer(None), Some(vec![USER_FINALIZER.to_string()]));
    }

    #[test]
    fn test_without_finalizer_keeps_others() {
        let existing = vec![USER_FINALIZER.to_string(), "other.io/cleanup".to_string()];

        let removed = without_finalizer(Some(existing.as_slice())).expect("finalizer should be removed");
        assert_eq!(removed, vec!["other.io/cleanup".to_string()]);

        assert!(without_finalizer(Some(removed.as_slice())).is_none());
        assert!(without_finalizer(None).is_none());
    }

    #[test]
    fn test_finalizer_patch_is_guarded_by_resource_version() {
        let finalizers = vec!["other.io/cleanup".to_string(), USER_FINALIZER.to_string()];

        let patch = finalizer_patch(&finalizers, Some("42"));
        assert_eq!(patch["metadata"]["resourceVersion"], "42");
        assert_eq!(
            patch["metadata"]["finalizers"],
            serde_json::json!(["other.io/cleanup", USER_FINALIZER])
        );

        let unversioned = finalizer_patch(&finalizers, None);
        assert!(unversioned["metadata"].get("resourceVersion").is_none());
    }

    #[test]
    fn test_has_finalizer() {
        let mut user = ClusterUser::new("test-user", ClusterUserSpec::default());
        assert!(!has_finalizer(&user));

        user.metadata.finalizers = Some(vec![USER_FINALIZER.to_string()]);
        assert!(has_finalizer(&user));
    }
}
