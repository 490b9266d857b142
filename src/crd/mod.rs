//! # Custom Resource Definitions
//!
//! CRD types used by the controller.
//!
//! ## Module Structure
//!
//! - `user.rs` - `ClusterUser`, the declared identity of one cluster participant
//! - `status.rs` - Status types for tracking reconciliation state
//! - `certificate.rs` - The cert-manager `Certificate` resource used for external issuance

mod certificate;
mod status;
mod user;

pub use certificate::{
    Certificate, CertificateCondition, CertificateKeystores, CertificateSpec,
    CertificateStatus, JksKeystore, SecretKeySelector,
};
pub use status::{ClusterUserStatus, Condition, UserPhase};
pub use user::{ClusterUser, ClusterUserSpec, IssuanceMode, IssuerRef};
