//! # User Identity
//!
//! Read-only value object describing one cluster participant, derived from a
//! `ClusterUser` resource.

use crate::crd::{ClusterUser, IssuanceMode, IssuerRef};
use crate::pki::error::PkiError;
use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub namespace: String,
    /// UID of the backing `ClusterUser`, used for owner references
    pub uid: Option<String>,
    pub secret_name: String,
    pub include_jks: bool,
    pub issuance: IssuanceMode,
    pub dns_names: Vec<String>,
    pub issuer_ref: Option<IssuerRef>,
}

impl UserIdentity {
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.issuance == IssuanceMode::External
    }

    /// Empty identity: nothing was ever created for it
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.namespace.is_empty()
    }

    /// Reject identities the reconciler cannot act on
    pub fn validate(&self) -> Result<(), PkiError> {
        if self.name.trim().is_empty() {
            return Err(PkiError::InvalidIdentity("user name cannot be empty".into()));
        }
        if self.namespace.trim().is_empty() {
            return Err(PkiError::InvalidIdentity(format!(
                "user '{}' has no namespace",
                self.name
            )));
        }
        validate_secret_name(&self.secret_name)
    }
}

impl From<&ClusterUser> for UserIdentity {
    fn from(user: &ClusterUser) -> Self {
        Self {
            name: user.metadata.name.clone().unwrap_or_default(),
            namespace: user.metadata.namespace.clone().unwrap_or_default(),
            uid: user.metadata.uid.clone(),
            secret_name: user.spec.secret_name.clone(),
            include_jks: user.spec.include_jks,
            issuance: user.spec.issuance,
            dns_names: user.spec.dns_names.clone(),
            issuer_ref: user.spec.issuer_ref.clone(),
        }
    }
}

/// Secret names must be RFC 1123 subdomains
/// Format: lowercase alphanumeric, hyphens, dots
/// Length: 1-253 characters
fn validate_secret_name(secret_name: &str) -> Result<(), PkiError> {
    if secret_name.is_empty() {
        return Err(PkiError::InvalidIdentity(
            "spec.secretName cannot be empty".into(),
        ));
    }

    if secret_name.len() > 253 {
        return Err(PkiError::InvalidIdentity(format!(
            "spec.secretName exceeds maximum length of 253 characters (got {})",
            secret_name.len()
        )));
    }

    let name_regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .map_err(|e| PkiError::InvalidIdentity(format!("Failed to compile regex: {e}")))?;

    if !name_regex.is_match(secret_name) {
        return Err(PkiError::InvalidIdentity(format!(
            "spec.secretName '{secret_name}' must be a valid Kubernetes name (lowercase alphanumeric, hyphens, dots; cannot start/end with hyphen or dot)"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ClusterUserSpec;

    fn identity() -> UserIdentity {
        UserIdentity {
            name: "test-user".into(),
            namespace: "test-namespace".into(),
            secret_name: "test-secret".into(),
            ..UserIdentity::default()
        }
    }

    #[test]
    fn test_valid_identity_passes() {
        assert!(identity().validate().is_ok());
    }

    #[test]
    fn test_empty_identity_is_rejected_and_reported_empty() {
        let empty = UserIdentity::default();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.validate(),
            Err(PkiError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_secret_name_must_be_rfc1123() {
        for bad in ["", "Test-Secret", "-leading", "trailing-", "under_score"] {
            let user = UserIdentity {
                secret_name: bad.into(),
                ..identity()
            };
            assert!(user.validate().is_err(), "'{bad}' should be rejected");
        }

        let dotted = UserIdentity {
            secret_name: "user.tls-bundle".into(),
            ..identity()
        };
        assert!(dotted.validate().is_ok());
    }

    #[test]
    fn test_from_cluster_user() {
        let mut user = ClusterUser::new(
            "ingest",
            ClusterUserSpec {
                secret_name: "ingest-tls".into(),
                include_jks: true,
                issuance: IssuanceMode::External,
                ..ClusterUserSpec::default()
            },
        );
        user.metadata.namespace = Some("data".into());
        user.metadata.uid = Some("1234".into());

        let identity = UserIdentity::from(&user);
        assert_eq!(identity.name, "ingest");
        assert_eq!(identity.namespace, "data");
        assert_eq!(identity.uid.as_deref(), Some("1234"));
        assert!(identity.include_jks);
        assert!(identity.is_external());
    }
}
