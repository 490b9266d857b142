//! # User Certificate Lifecycle Tests
//!
//! End-to-end runs of the certificate manager against the in-memory adapters:
//! a self-provisioned user, an externally issued user with JKS output, and
//! the ownership conflicts the manager must refuse to paper over.

use user_pki_controller::constants::{
    CA_CERT_KEY, JKS_KEYSTORE_KEY, JKS_PASSWORD_KEY, JKS_TRUSTSTORE_KEY, TLS_CERT_KEY,
    TLS_PRIVATE_KEY_KEY,
};
use user_pki_controller::crd::{ClusterUser, IssuerRef};
use user_pki_controller::issuance::{CertificateRequestStatus, InMemoryIssuer};
use user_pki_controller::pki::{codec, UserCertificateManager, UserIdentity};
use user_pki_controller::store::{InMemorySecretStore, SecretStore, StoredSecret};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

fn manager() -> UserCertificateManager<InMemorySecretStore, InMemoryIssuer> {
    UserCertificateManager::new(
        InMemorySecretStore::new(),
        InMemoryIssuer::new(),
        IssuerRef {
            name: "dataplane-ca".into(),
            kind: "ClusterIssuer".into(),
            group: "cert-manager.io".into(),
        },
    )
}

fn cluster_user(yaml: &str) -> ClusterUser {
    serde_yaml::from_str(yaml).expect("ClusterUser YAML should deserialize")
}

const SELF_PROVISIONED_USER: &str = r#"
apiVersion: security.dataplane.io/v1
kind: ClusterUser
metadata:
  name: test-user
  namespace: test-namespace
  uid: 7d7c7e80-5a8f-4d2e-9a53-2f1f0b6f1a10
spec:
  secretName: test-secret
  includeJKS: true
"#;

const EXTERNAL_USER: &str = r#"
apiVersion: security.dataplane.io/v1
kind: ClusterUser
metadata:
  name: ingest-worker
  namespace: data
  uid: 0c9f5f4e-1b7a-4c0e-8a0e-3b8d1f7e2c55
spec:
  secretName: ingest-worker-tls
  includeJKS: true
  issuance: External
  dnsNames:
    - ingest-worker.data.svc
"#;

/// PEM material as an issuer would write it
fn issued_fields() -> Vec<(&'static str, Vec<u8>)> {
    let generated = rcgen::generate_simple_self_signed(vec!["ingest-worker".to_string()])
        .expect("rcgen should generate a certificate");
    let cert = generated.cert.pem().into_bytes();
    vec![
        (CA_CERT_KEY, cert.clone()),
        (TLS_CERT_KEY, cert),
        (TLS_PRIVATE_KEY_KEY, generated.key_pair.serialize_pem().into_bytes()),
        (JKS_KEYSTORE_KEY, b"keystore-bytes".to_vec()),
        (JKS_TRUSTSTORE_KEY, b"truststore-bytes".to_vec()),
    ]
}

#[tokio::test]
async fn test_finalize_empty_identity_is_noop() {
    let manager = manager();

    manager
        .finalize_user_certificate(&UserIdentity::default())
        .await
        .expect("empty identity should finalize cleanly");

    assert_eq!(manager.secrets().create_count(), 0);
    assert_eq!(manager.issuer().create_count(), 0);
}

#[tokio::test]
async fn test_self_provisioned_user_waits_then_succeeds() {
    let manager = manager();
    let user = UserIdentity::from(&cluster_user(SELF_PROVISIONED_USER));

    let err = manager
        .reconcile_user_certificate(&user)
        .await
        .expect_err("secret does not exist yet");
    assert!(err.is_not_ready(), "got {err:?}");

    let mut secret = StoredSecret::new("test-namespace", "test-secret");
    for (key, value) in issued_fields() {
        secret = secret.with_field(key, value);
    }
    secret = secret.with_field(JKS_PASSWORD_KEY, "testpassword");
    manager.secrets().insert(secret).await;

    let bundle = manager
        .reconcile_user_certificate(&user)
        .await
        .expect("complete secret should reconcile");

    let decoded = codec::decode_certificate(TLS_CERT_KEY, &bundle.certificate)
        .expect("returned certificate should decode");
    assert!(decoded.not_after.is_some());
    let jks = bundle.jks.as_ref().expect("JKS was requested");
    assert_eq!(jks.password, b"testpassword");

    // Repeated calls against an unchanged secret return the same bundle
    let again = manager
        .reconcile_user_certificate(&user)
        .await
        .expect("second reconcile should succeed");
    assert_eq!(again, bundle);
    assert_eq!(manager.secrets().create_count(), 0);
    assert_eq!(manager.secrets().update_count(), 0);
}

#[tokio::test]
async fn test_external_user_full_lifecycle() {
    let manager = manager();
    let user = UserIdentity::from(&cluster_user(EXTERNAL_USER));

    // First pass creates the request and seeds the keystore password
    let err = manager
        .reconcile_user_certificate(&user)
        .await
        .expect_err("request was just created");
    assert!(err.is_not_ready(), "got {err:?}");

    let spec = manager
        .issuer()
        .created_spec("data", "ingest-worker")
        .await
        .expect("certificate request should be created");
    assert_eq!(spec.secret_name, "ingest-worker-tls");
    assert_eq!(spec.dns_names, vec!["ingest-worker.data.svc".to_string()]);
    assert_eq!(spec.issuer.name, "dataplane-ca");
    assert_eq!(spec.owner.name, "ingest-worker");

    let err = manager
        .reconcile_user_certificate(&user)
        .await
        .expect_err("issuer has not written the secret yet");
    assert!(err.is_not_ready(), "got {err:?}");

    let seeded = manager
        .secrets()
        .snapshot("data", "ingest-worker-tls")
        .await
        .expect("secret should be seeded with a keystore password");
    let password = seeded
        .field(JKS_PASSWORD_KEY)
        .expect("password should be generated")
        .to_vec();
    assert!(!password.is_empty());

    // Issuer fills in the secret and reports ready
    let mut issued = seeded.clone();
    for (key, value) in issued_fields() {
        issued = issued.with_field(key, value);
    }
    manager
        .secrets()
        .update(issued)
        .await
        .expect("issuer update should apply");
    assert!(manager.issuer().mark_ready("data", "ingest-worker").await);

    let bundle = manager
        .reconcile_user_certificate(&user)
        .await
        .expect("issued secret should reconcile");
    let jks = bundle.jks.as_ref().expect("JKS was requested");
    assert_eq!(jks.password, password);
    assert_eq!(jks.keystore, b"keystore-bytes");
    assert_eq!(manager.issuer().create_count(), 1);

    // Deleting the user removes what it owns
    manager
        .finalize_user_certificate(&user)
        .await
        .expect("finalize should succeed");
    assert!(!manager.issuer().contains("data", "ingest-worker").await);
    assert!(manager
        .secrets()
        .snapshot("data", "ingest-worker-tls")
        .await
        .is_none());

    // Finalizing twice is harmless
    manager
        .finalize_user_certificate(&user)
        .await
        .expect("second finalize should succeed");
}

#[tokio::test]
async fn test_foreign_request_is_a_conflict_and_survives_finalize() {
    let manager = manager();
    let user = UserIdentity::from(&cluster_user(EXTERNAL_USER));

    let platform = OwnerReference {
        api_version: "platform.example.com/v1".into(),
        kind: "Tenant".into(),
        name: "platform".into(),
        uid: "uid-platform".into(),
        controller: Some(true),
        block_owner_deletion: None,
    };
    manager
        .issuer()
        .insert(CertificateRequestStatus {
            name: "ingest-worker".into(),
            namespace: "data".into(),
            ready: true,
            secret_name: "ingest-worker-tls".into(),
            owner_references: vec![platform],
            message: None,
        })
        .await;

    let err = manager
        .reconcile_user_certificate(&user)
        .await
        .expect_err("request belongs to another controller");
    assert!(err.is_conflict(), "got {err:?}");
    assert_eq!(manager.secrets().create_count(), 0);

    manager
        .finalize_user_certificate(&user)
        .await
        .expect("finalize should skip objects it does not own");
    assert!(manager.issuer().contains("data", "ingest-worker").await);
}

#[tokio::test]
async fn test_malformed_certificate_is_a_decode_error() {
    let manager = manager();
    let user = UserIdentity::from(&cluster_user(SELF_PROVISIONED_USER));

    let mut secret = StoredSecret::new("test-namespace", "test-secret");
    for (key, value) in issued_fields() {
        secret = secret.with_field(key, value);
    }
    secret = secret
        .with_field(TLS_CERT_KEY, "not a certificate")
        .with_field(JKS_PASSWORD_KEY, "testpassword");
    manager.secrets().insert(secret).await;

    let err = manager
        .reconcile_user_certificate(&user)
        .await
        .expect_err("tls.crt is not PEM");
    assert_eq!(err.kind(), "DecodeError");
    assert!(err.to_string().contains(TLS_CERT_KEY), "got {err}");
}
