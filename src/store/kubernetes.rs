//! # Kubernetes Secret Store
//!
//! [`SecretStore`] backed by the Kubernetes Secrets API.

use super::{SecretStore, StoredSecret};
use crate::constants::FIELD_MANAGER;
use crate::pki::AdapterError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

const KIND: &str = "Secret";

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn from_secret(namespace: &str, secret: Secret) -> StoredSecret {
    StoredSecret {
        namespace: secret
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        name: secret.metadata.name.unwrap_or_default(),
        data: secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect(),
        owner_references: secret.metadata.owner_references.unwrap_or_default(),
        labels: secret.metadata.labels.unwrap_or_default(),
        resource_version: secret.metadata.resource_version,
    }
}

fn encode_data(data: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, ByteString> {
    data.iter()
        .map(|(key, value)| (key.clone(), ByteString(value.clone())))
        .collect()
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredSecret>, AdapterError> {
        match self.api(namespace).get(name).await {
            Ok(secret) => Ok(Some(from_secret(namespace, secret))),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
            Err(e) => Err(AdapterError::Api(e)),
        }
    }

    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, AdapterError> {
        let object = Secret {
            metadata: ObjectMeta {
                name: Some(secret.name.clone()),
                namespace: Some(secret.namespace.clone()),
                owner_references: (!secret.owner_references.is_empty())
                    .then(|| secret.owner_references.clone()),
                labels: (!secret.labels.is_empty()).then(|| secret.labels.clone()),
                ..ObjectMeta::default()
            },
            data: Some(encode_data(&secret.data)),
            ..Secret::default()
        };

        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };

        match self.api(&secret.namespace).create(&params, &object).await {
            Ok(created) => {
                debug!(secret.namespace = %secret.namespace, secret.name = %secret.name, "secret.created");
                Ok(from_secret(&secret.namespace, created))
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(AdapterError::AlreadyExists {
                    kind: KIND,
                    namespace: secret.namespace,
                    name: secret.name,
                })
            }
            Err(e) => Err(AdapterError::Api(e)),
        }
    }

    async fn update(&self, secret: StoredSecret) -> Result<StoredSecret, AdapterError> {
        // A merge patch carrying metadata.resourceVersion is rejected with 409
        // when the object changed since it was read
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": secret.resource_version,
                "ownerReferences": secret.owner_references,
            },
            "data": encode_data(&secret.data),
        });

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };

        match self
            .api(&secret.namespace)
            .patch(&secret.name, &params, &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => Ok(from_secret(&secret.namespace, updated)),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => Err(AdapterError::Stale {
                kind: KIND,
                namespace: secret.namespace,
                name: secret.name,
            }),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                Err(AdapterError::NotFound {
                    kind: KIND,
                    namespace: secret.namespace,
                    name: secret.name,
                })
            }
            Err(e) => Err(AdapterError::Api(e)),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(AdapterError::NotFound {
                kind: KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(AdapterError::Api(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    #[test]
    fn test_from_secret_copies_data_and_metadata() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("test-secret".into()),
                resource_version: Some("42".into()),
                owner_references: Some(vec![OwnerReference {
                    kind: "ClusterUser".into(),
                    name: "test-user".into(),
                    ..OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "ca.crt".to_string(),
                ByteString(b"pem".to_vec()),
            )])),
            ..Secret::default()
        };

        let stored = from_secret("test-namespace", secret);
        assert_eq!(stored.namespace, "test-namespace");
        assert_eq!(stored.name, "test-secret");
        assert_eq!(stored.field("ca.crt"), Some(&b"pem"[..]));
        assert_eq!(stored.resource_version.as_deref(), Some("42"));
        assert_eq!(stored.owner_references.len(), 1);
    }

    #[test]
    fn test_secret_without_data_has_no_fields() {
        let stored = from_secret("ns", Secret::default());
        assert!(stored.data.is_empty());
        assert_eq!(stored.field("tls.crt"), None);
    }
}
