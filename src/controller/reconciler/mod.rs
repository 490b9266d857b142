//! # Reconciler
//!
//! Reconciliation logic for `ClusterUser` resources.
//!
//! The reconciler:
//! - Watches `ClusterUser` resources across all namespaces
//! - Provisions the user's certificate Secret, directly or through cert-manager
//! - Verifies the Secret holds a decodable PEM bundle (plus JKS when requested)
//! - Cleans up owned certificate objects when the user is deleted
//! - Updates resource status with the certificate state

pub mod finalizer;
pub mod reconcile;
pub mod status;
pub mod types;

pub use reconcile::reconcile;
pub use types::{BackoffState, KubeCertificateManager, Reconciler, ReconcilerError};
