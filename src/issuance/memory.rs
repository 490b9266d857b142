//! # In-Memory Issuer
//!
//! [`CertificateIssuer`] kept in process memory. Requests stay pending until
//! [`InMemoryIssuer::mark_ready`] is called, standing in for the external
//! issuer. Clones share state.

use super::{CertificateIssuer, CertificateRequestSpec, CertificateRequestStatus};
use crate::pki::AdapterError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

const KIND: &str = "Certificate";

type RequestKey = (String, String);

#[derive(Clone, Debug, Default)]
pub struct InMemoryIssuer {
    requests: Arc<RwLock<BTreeMap<RequestKey, CertificateRequestStatus>>>,
    specs: Arc<RwLock<BTreeMap<RequestKey, CertificateRequestSpec>>>,
    creates: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request as if another actor had created it
    pub async fn insert(&self, status: CertificateRequestStatus) {
        let key = (status.namespace.clone(), status.name.clone());
        self.requests.write().await.insert(key, status);
    }

    /// Flip a request to ready; returns false when it does not exist
    pub async fn mark_ready(&self, namespace: &str, name: &str) -> bool {
        let key = (namespace.to_string(), name.to_string());
        match self.requests.write().await.get_mut(&key) {
            Some(status) => {
                status.ready = true;
                true
            }
            None => false,
        }
    }

    /// Spec the request was created with, if this issuer created it
    pub async fn created_spec(&self, namespace: &str, name: &str) -> Option<CertificateRequestSpec> {
        self.specs
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn contains(&self, namespace: &str, name: &str) -> bool {
        self.requests
            .read()
            .await
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `create` calls
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), AdapterError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable(
                "in-memory issuer is unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateIssuer for InMemoryIssuer {
    async fn create(
        &self,
        request: CertificateRequestSpec,
    ) -> Result<CertificateRequestStatus, AdapterError> {
        self.check_available()?;
        let key = (request.namespace.clone(), request.name.clone());
        let mut requests = self.requests.write().await;
        if requests.contains_key(&key) {
            return Err(AdapterError::AlreadyExists {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            });
        }

        let status = CertificateRequestStatus {
            name: request.name.clone(),
            namespace: request.namespace.clone(),
            ready: false,
            secret_name: request.secret_name.clone(),
            owner_references: vec![request.owner.clone()],
            message: None,
        };
        requests.insert(key.clone(), status.clone());
        self.specs.write().await.insert(key, request);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(status)
    }

    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CertificateRequestStatus>, AdapterError> {
        self.check_available()?;
        Ok(self
            .requests
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError> {
        self.check_available()?;
        let key = (namespace.to_string(), name.to_string());
        self.specs.write().await.remove(&key);
        match self.requests.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(AdapterError::NotFound {
                kind: KIND,
                namespace: key.0,
                name: key.1,
            }),
        }
    }
}
