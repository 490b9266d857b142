//! # PKI
//!
//! Reconciliation engine for per-user certificate bundles.
//!
//! - `identity.rs` - User Identity value object and validation
//! - `binding.rs` - Owner-Binding Resolver (request name, owner reference, conflict predicate)
//! - `codec.rs` - PEM certificate and key codec
//! - `bundle.rs` - Materialized certificate bundle
//! - `error.rs` - Error taxonomy
//! - `manager.rs` - `reconcile_user_certificate` / `finalize_user_certificate`

pub mod binding;
pub mod bundle;
pub mod codec;
pub mod error;
pub mod identity;
pub mod manager;

pub use binding::{OwnerBinding, Ownership};
pub use bundle::{JksBundle, UserCertificate};
pub use codec::CodecError;
pub use error::{AdapterError, PkiError};
pub use identity::UserIdentity;
pub use manager::UserCertificateManager;
