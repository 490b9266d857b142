//! # Error Taxonomy
//!
//! Errors returned by the certificate reconciler and the adapters it drives.
//!
//! `NotReady` is an expected transient state, not a failure. Everything else
//! is surfaced to the controller and retried with backoff.

use crate::pki::codec::CodecError;
use thiserror::Error;

/// Errors raised by the Secret Store and Issuance adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The conditional write lost against a concurrent writer
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Stale {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl AdapterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AdapterError::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, AdapterError::Stale { .. })
    }
}

/// Errors returned by `reconcile_user_certificate` and `finalize_user_certificate`
#[derive(Debug, Error)]
pub enum PkiError {
    /// A dependent resource has not materialized yet; retry later
    #[error("certificate not ready: {0}")]
    NotReady(String),

    /// An object at the user's expected name is controlled by someone else
    #[error("{kind} {namespace}/{name} is controlled by {owner}, not by user {user}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        owner: String,
        user: String,
    },

    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("invalid user identity: {0}")]
    InvalidIdentity(String),
}

impl PkiError {
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PkiError::NotReady(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, PkiError::Conflict { .. })
    }

    /// Short classification used for status reasons and metric labels
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PkiError::NotReady(_) => "NotReady",
            PkiError::Conflict { .. } => "Conflict",
            PkiError::Decode(_) => "DecodeError",
            PkiError::Adapter(_) => "ApiError",
            PkiError::InvalidIdentity(_) => "InvalidSpec",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(PkiError::NotReady("waiting".into()).kind(), "NotReady");
        assert_eq!(
            PkiError::InvalidIdentity("empty name".into()).kind(),
            "InvalidSpec"
        );
        let adapter = PkiError::from(AdapterError::Unavailable("down".into()));
        assert_eq!(adapter.kind(), "ApiError");
        assert!(!adapter.is_not_ready());
    }

    #[test]
    fn test_conflict_message_names_owner() {
        let err = PkiError::Conflict {
            kind: "Certificate",
            namespace: "data".into(),
            name: "alice".into(),
            owner: "ClusterIssuer/platform".into(),
            user: "alice".into(),
        };
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "Certificate data/alice is controlled by ClusterIssuer/platform, not by user alice"
        );
    }
}
