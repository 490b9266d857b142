//! # CRD Tests
//!
//! Schema-level checks for `ClusterUser` and the cert-manager `Certificate`
//! view, so field renames and defaults do not drift silently.

use kube::core::CustomResourceExt;
use user_pki_controller::crd::{
    Certificate, ClusterUser, ClusterUserStatus, IssuanceMode, UserPhase,
};

#[test]
fn test_cluster_user_defaults() {
    let yaml = r#"
apiVersion: security.dataplane.io/v1
kind: ClusterUser
metadata:
  name: minimal
  namespace: default
spec:
  secretName: minimal-tls
"#;

    let user: ClusterUser = serde_yaml::from_str(yaml).expect("minimal ClusterUser should parse");

    assert_eq!(user.spec.secret_name, "minimal-tls");
    assert!(!user.spec.include_jks);
    assert_eq!(user.spec.issuance, IssuanceMode::SelfProvisioned);
    assert!(user.spec.dns_names.is_empty());
    assert!(user.spec.issuer_ref.is_none());
    assert!(user.status.is_none());
}

#[test]
fn test_cluster_user_with_issuer_override() {
    let yaml = r#"
apiVersion: security.dataplane.io/v1
kind: ClusterUser
metadata:
  name: ingest-worker
  namespace: data
spec:
  secretName: ingest-worker-tls
  includeJKS: true
  issuance: External
  dnsNames:
    - ingest-worker.data.svc
  issuerRef:
    name: team-ca
"#;

    let user: ClusterUser = serde_yaml::from_str(yaml).expect("ClusterUser should parse");

    assert!(user.spec.include_jks);
    assert_eq!(user.spec.issuance, IssuanceMode::External);
    let issuer = user.spec.issuer_ref.expect("issuerRef was set");
    assert_eq!(issuer.name, "team-ca");
    assert_eq!(issuer.kind, "ClusterIssuer");
    assert_eq!(issuer.group, "cert-manager.io");
}

#[test]
fn test_cluster_user_status_round_trip_uses_camel_case() {
    let status = ClusterUserStatus {
        phase: Some(UserPhase::Ready),
        observed_generation: Some(2),
        certificate_not_after: Some("2027-01-01T00:00:00+00:00".into()),
        ..ClusterUserStatus::default()
    };

    let value = serde_json::to_value(&status).expect("status should serialize");
    assert_eq!(value["phase"], "Ready");
    assert_eq!(value["observedGeneration"], 2);
    assert_eq!(value["certificateNotAfter"], "2027-01-01T00:00:00+00:00");
}

#[test]
fn test_cluster_user_crd_metadata() {
    let crd = ClusterUser::crd();

    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("clusterusers.security.dataplane.io")
    );
    assert_eq!(crd.spec.group, "security.dataplane.io");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(
        crd.spec.names.short_names,
        Some(vec!["cu".to_string()])
    );

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1");
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());
}

#[test]
fn test_certificate_readiness_from_cert_manager_status() {
    let yaml = r#"
apiVersion: cert-manager.io/v1
kind: Certificate
metadata:
  name: ingest-worker
  namespace: data
spec:
  secretName: ingest-worker-tls
  commonName: ingest-worker
  usages:
    - client auth
    - server auth
  issuerRef:
    name: dataplane-ca
    kind: ClusterIssuer
    group: cert-manager.io
status:
  conditions:
    - type: Ready
      status: "True"
      reason: Ready
  notAfter: "2027-01-01T00:00:00Z"
"#;

    let certificate: Certificate =
        serde_yaml::from_str(yaml).expect("cert-manager Certificate should parse");

    assert!(certificate.is_ready());
    assert_eq!(certificate.spec.secret_name, "ingest-worker-tls");
    assert!(certificate.spec.keystores.is_none());
}
