//! # In-Memory Secret Store
//!
//! [`SecretStore`] kept in process memory with resource-version checks that
//! behave like the API server's. Used by tests and local runs.
//!
//! Clones share the same underlying map.

use super::{SecretStore, StoredSecret};
use crate::pki::AdapterError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

const KIND: &str = "Secret";

type SecretKey = (String, String);

#[derive(Clone, Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<BTreeMap<SecretKey, StoredSecret>>>,
    next_version: Arc<AtomicU64>,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret as if an external actor had created it
    pub async fn insert(&self, mut secret: StoredSecret) {
        secret.resource_version = Some(self.bump_version());
        let key = (secret.namespace.clone(), secret.name.clone());
        self.secrets.write().await.insert(key, secret);
    }

    /// Current stored copy, bypassing availability checks
    pub async fn snapshot(&self, namespace: &str, name: &str) -> Option<StoredSecret> {
        self.secrets
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Make every call fail with [`AdapterError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `create` calls
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of successful `update` calls
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn bump_version(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn check_available(&self) -> Result<(), AdapterError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable(
                "in-memory secret store is unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredSecret>, AdapterError> {
        self.check_available()?;
        Ok(self.snapshot(namespace, name).await)
    }

    async fn create(&self, mut secret: StoredSecret) -> Result<StoredSecret, AdapterError> {
        self.check_available()?;
        let mut secrets = self.secrets.write().await;
        let key = (secret.namespace.clone(), secret.name.clone());
        if secrets.contains_key(&key) {
            return Err(AdapterError::AlreadyExists {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            });
        }
        secret.resource_version = Some(self.bump_version());
        secrets.insert(key, secret.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(secret)
    }

    async fn update(&self, secret: StoredSecret) -> Result<StoredSecret, AdapterError> {
        self.check_available()?;
        let mut secrets = self.secrets.write().await;
        let key = (secret.namespace.clone(), secret.name.clone());
        let Some(current) = secrets.get_mut(&key) else {
            return Err(AdapterError::NotFound {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            });
        };

        if secret.resource_version.is_some() && secret.resource_version != current.resource_version
        {
            return Err(AdapterError::Stale {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            });
        }

        // Merge semantics: data keys are overlaid, owner references replaced
        for (field, value) in secret.data {
            current.data.insert(field, value);
        }
        current.owner_references = secret.owner_references;
        current.resource_version = Some(self.bump_version());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(current.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError> {
        self.check_available()?;
        let key = (namespace.to_string(), name.to_string());
        match self.secrets.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(AdapterError::NotFound {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            }),
        }
    }
}
