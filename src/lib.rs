//! User PKI Controller Library
//!
//! Converges per-user X.509 identities into Kubernetes Secrets. Each
//! `ClusterUser` gets a Secret holding `ca.crt`, `tls.crt` and `tls.key`
//! (plus JKS keystores when requested), either provisioned directly or
//! issued through a cert-manager `Certificate`.
//!
//! ## Quick Start
//!
//! ```rust
//! use user_pki_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod issuance;
pub mod observability;
pub mod pki;
pub mod prelude;
pub mod runtime;
pub mod store;
