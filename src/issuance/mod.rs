//! # Issuance
//!
//! Issuance Adapter: creates, reads and deletes the Certificate Request an
//! out-of-process issuer fulfills asynchronously.
//!
//! - `cert_manager.rs` - cert-manager `Certificate` implementation
//! - `memory.rs` - In-process implementation for tests and local runs

mod cert_manager;
mod memory;

pub use cert_manager::CertManagerIssuer;
pub use memory::InMemoryIssuer;

use crate::crd::IssuerRef;
use crate::pki::AdapterError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

/// Key usages requested for every user certificate
pub const USER_CERTIFICATE_USAGES: [&str; 2] = ["client auth", "server auth"];

/// Desired Certificate Request for one user
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRequestSpec {
    pub name: String,
    pub namespace: String,
    /// Secret the issuer writes the bundle into
    pub secret_name: String,
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub issuer: IssuerRef,
    /// Secret field holding the keystore password, when JKS output is wanted
    pub jks_password_key: Option<String>,
    pub owner: OwnerReference,
    pub labels: BTreeMap<String, String>,
}

/// Observed state of a Certificate Request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CertificateRequestStatus {
    pub name: String,
    pub namespace: String,
    /// Issuer has finished writing the Secret
    pub ready: bool,
    /// Secret the request populates
    pub secret_name: String,
    pub owner_references: Vec<OwnerReference>,
    /// Issuer-provided detail for the current state
    pub message: Option<String>,
}

/// Issuance Adapter
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Create a request; [`AdapterError::AlreadyExists`] when the name is taken
    async fn create(
        &self,
        request: CertificateRequestSpec,
    ) -> Result<CertificateRequestStatus, AdapterError>;

    /// Read a request; `Ok(None)` when it does not exist
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CertificateRequestStatus>, AdapterError>;

    /// Delete a request; [`AdapterError::NotFound`] when it is already gone
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError>;
}
