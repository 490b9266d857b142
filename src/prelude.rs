//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use user_pki_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (`ClusterUser`, `Certificate`, etc.)
//! - Adapter traits (`SecretStore`, `CertificateIssuer`)
//! - The certificate manager and its error types
//! - Reconciler types and config types

pub use crate::crd::*;

pub use crate::issuance::{CertificateIssuer, CertificateRequestSpec, CertificateRequestStatus};
pub use crate::store::{SecretStore, StoredSecret};

pub use crate::pki::{
    AdapterError, CodecError, JksBundle, PkiError, UserCertificate, UserCertificateManager,
    UserIdentity,
};

pub use crate::controller::reconciler::{reconcile, BackoffState, Reconciler, ReconcilerError};

pub use crate::config::{ControllerConfig, ServerConfig};
