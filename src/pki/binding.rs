//! # Owner Binding
//!
//! Pure mapping from a [`UserIdentity`] to the names, owner reference and
//! labels stamped on the objects created for it, plus the ownership predicate
//! used for conflict detection. No I/O.

use crate::constants::{FIELD_MANAGER, MANAGED_BY_LABEL, USER_LABEL};
use crate::crd::{Certificate, ClusterUser};
use crate::pki::identity::UserIdentity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::collections::BTreeMap;

/// How an existing object relates to a user
#[derive(Debug, Clone, PartialEq)]
pub enum Ownership {
    /// Controlled by this user
    Owned,
    /// No controller owner at all
    Unowned,
    /// Controlled by something else
    Foreign(OwnerReference),
}

impl Ownership {
    /// `kind/name` of the foreign controller, for error messages
    #[must_use]
    pub fn describe_owner(&self) -> String {
        match self {
            Ownership::Owned => "this user".to_string(),
            Ownership::Unowned => "no controller".to_string(),
            Ownership::Foreign(owner) => format!("{}/{}", owner.kind, owner.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OwnerBinding {
    /// Deterministic Certificate Request name
    pub request_name: String,
    /// Owner reference pointing back at the `ClusterUser`
    pub owner: OwnerReference,
    pub labels: BTreeMap<String, String>,
}

impl OwnerBinding {
    #[must_use]
    pub fn resolve(user: &UserIdentity) -> Self {
        let owner = OwnerReference {
            api_version: ClusterUser::api_version(&()).to_string(),
            kind: ClusterUser::kind(&()).to_string(),
            name: user.name.clone(),
            uid: user.uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };

        let labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string()),
            (USER_LABEL.to_string(), user.name.clone()),
        ]);

        Self {
            request_name: user.name.clone(),
            owner,
            labels,
        }
    }

    /// Classify an object by its owner references
    ///
    /// Only the controller reference counts. It matches this user when kind
    /// and name agree and, if both sides carry one, the UID agrees too. A
    /// controller that is this user's own Certificate Request also counts, as
    /// issuers may stamp the Secret they write with the request as owner.
    #[must_use]
    pub fn ownership(&self, owner_references: &[OwnerReference]) -> Ownership {
        let Some(controller) = owner_references
            .iter()
            .find(|r| r.controller.unwrap_or(false))
        else {
            return Ownership::Unowned;
        };

        if self.matches(controller) || self.is_own_request(controller) {
            Ownership::Owned
        } else {
            Ownership::Foreign(controller.clone())
        }
    }

    /// True when the references contain a controller other than this user
    #[must_use]
    pub fn is_conflict(&self, owner_references: &[OwnerReference]) -> bool {
        matches!(self.ownership(owner_references), Ownership::Foreign(_))
    }

    /// Owner references with this user installed as controller
    ///
    /// Existing non-controller references are kept.
    #[must_use]
    pub fn adopt(&self, owner_references: &[OwnerReference]) -> Vec<OwnerReference> {
        let mut adopted: Vec<OwnerReference> = owner_references
            .iter()
            .filter(|r| !self.matches(r))
            .cloned()
            .collect();
        adopted.push(self.owner.clone());
        adopted
    }

    fn matches(&self, reference: &OwnerReference) -> bool {
        if reference.kind != self.owner.kind || reference.name != self.owner.name {
            return false;
        }
        if api_group(&reference.api_version) != api_group(&self.owner.api_version) {
            return false;
        }
        self.owner.uid.is_empty() || reference.uid.is_empty() || reference.uid == self.owner.uid
    }

    fn is_own_request(&self, reference: &OwnerReference) -> bool {
        reference.kind == Certificate::kind(&())
            && reference.name == self.request_name
            && api_group(&reference.api_version) == Certificate::group(&())
    }
}

/// Group part of an `apiVersion`; empty for the core group
fn api_group(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}
