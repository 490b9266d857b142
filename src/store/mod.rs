//! # Secret Store
//!
//! Secret Store Adapter: CRUD on the Kubernetes Secrets that hold user
//! certificate bundles.
//!
//! - `kubernetes.rs` - Kubernetes API implementation
//! - `memory.rs` - In-process implementation with resource-version checks

mod kubernetes;
mod memory;

pub use kubernetes::KubeSecretStore;
pub use memory::InMemorySecretStore;

use crate::pki::AdapterError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

/// A Secret as seen by the reconciler
#[derive(Clone, Default, PartialEq)]
pub struct StoredSecret {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, Vec<u8>>,
    pub owner_references: Vec<OwnerReference>,
    pub labels: BTreeMap<String, String>,
    /// Version observed on read; writes are conditioned on it when set
    pub resource_version: Option<String>,
}

impl StoredSecret {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }

    /// Field value, treating an empty value as absent
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&[u8]> {
        self.data
            .get(key)
            .map(Vec::as_slice)
            .filter(|value| !value.is_empty())
    }
}

impl std::fmt::Debug for StoredSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSecret")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("owner_references", &self.owner_references)
            .field("resource_version", &self.resource_version)
            .finish_non_exhaustive()
    }
}

/// Secret Store Adapter
///
/// Every call is individually atomic. `update` is conditioned on the
/// secret's `resource_version` and fails with [`AdapterError::Stale`] when a
/// concurrent writer won.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredSecret>, AdapterError>;

    /// Create a secret; [`AdapterError::AlreadyExists`] when the name is taken
    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, AdapterError>;

    /// Write data fields and owner references of an existing secret
    async fn update(&self, secret: StoredSecret) -> Result<StoredSecret, AdapterError>;

    /// Delete a secret; [`AdapterError::NotFound`] when it is already gone
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError>;
}
