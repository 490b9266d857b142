//! # ClusterUser Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// ClusterUser Custom Resource Definition
///
/// Declares one participant of the data service cluster that needs a TLS
/// identity. The controller converges the Secret named by `secretName` into a
/// complete certificate bundle (CA, certificate, key and optionally JKS).
///
/// # Example
///
/// ```yaml
/// apiVersion: security.dataplane.io/v1
/// kind: ClusterUser
/// metadata:
///   name: ingest-worker
///   namespace: data
/// spec:
///   secretName: ingest-worker-tls
///   includeJKS: true
///   issuance: External
///   dnsNames:
///     - ingest-worker.data.svc
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterUser",
    group = "security.dataplane.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ClusterUserStatus",
    shortname = "cu",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUserSpec {
    /// Name of the Secret holding the certificate bundle
    pub secret_name: String,
    /// Also materialize a JKS keystore, truststore and keystore password
    #[serde(default, rename = "includeJKS")]
    pub include_jks: bool,
    /// Where the certificate comes from
    /// Default: SelfProvisioned
    #[serde(default)]
    pub issuance: IssuanceMode,
    /// Additional DNS subject alternative names (External issuance only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    /// Issuer override (External issuance only)
    /// If not specified, the controller default issuer is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerRef>,
}

/// Certificate origin for a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum IssuanceMode {
    /// Secret is produced by another actor; the controller only waits for and validates it
    #[default]
    SelfProvisioned,
    /// Controller requests the certificate from cert-manager
    External,
}

/// Reference to a cert-manager issuer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    /// Issuer name
    pub name: String,
    /// Issuer kind
    #[serde(default = "default_issuer_kind")]
    pub kind: String,
    /// Issuer API group
    #[serde(default = "default_issuer_group")]
    pub group: String,
}

fn default_issuer_kind() -> String {
    crate::constants::DEFAULT_ISSUER_KIND.to_string()
}

fn default_issuer_group() -> String {
    crate::constants::DEFAULT_ISSUER_GROUP.to_string()
}
