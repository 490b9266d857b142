//! # cert-manager Issuer
//!
//! [`CertificateIssuer`] that maps Certificate Requests onto cert-manager
//! `Certificate` resources.

use super::{
    CertificateIssuer, CertificateRequestSpec, CertificateRequestStatus, USER_CERTIFICATE_USAGES,
};
use crate::constants::FIELD_MANAGER;
use crate::crd::{
    Certificate, CertificateKeystores, CertificateSpec, JksKeystore, SecretKeySelector,
};
use crate::pki::AdapterError;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tracing::debug;

const KIND: &str = "Certificate";

#[derive(Clone)]
pub struct CertManagerIssuer {
    client: Client,
}

impl std::fmt::Debug for CertManagerIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertManagerIssuer").finish_non_exhaustive()
    }
}

impl CertManagerIssuer {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Certificate> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Build the cert-manager `Certificate` for a request
pub(crate) fn to_certificate(request: &CertificateRequestSpec) -> Certificate {
    let keystores = request.jks_password_key.as_ref().map(|key| CertificateKeystores {
        jks: Some(JksKeystore {
            create: true,
            password_secret_ref: SecretKeySelector {
                name: request.secret_name.clone(),
                key: key.clone(),
            },
        }),
    });

    let mut certificate = Certificate::new(
        &request.name,
        CertificateSpec {
            secret_name: request.secret_name.clone(),
            common_name: Some(request.common_name.clone()),
            dns_names: request.dns_names.clone(),
            usages: USER_CERTIFICATE_USAGES
                .iter()
                .map(ToString::to_string)
                .collect(),
            issuer_ref: request.issuer.clone(),
            keystores,
        },
    );
    certificate.metadata.namespace = Some(request.namespace.clone());
    certificate.metadata.owner_references = Some(vec![request.owner.clone()]);
    certificate.metadata.labels = Some(request.labels.clone());
    certificate
}

/// Reduce a cert-manager `Certificate` to the fields the reconciler reads
pub(crate) fn from_certificate(namespace: &str, certificate: &Certificate) -> CertificateRequestStatus {
    let message = certificate.status.as_ref().and_then(|status| {
        status
            .conditions
            .iter()
            .find(|c| c.r#type == "Ready")
            .and_then(|c| c.message.clone())
    });

    CertificateRequestStatus {
        name: certificate.metadata.name.clone().unwrap_or_default(),
        namespace: certificate
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string()),
        ready: certificate.is_ready(),
        secret_name: certificate.spec.secret_name.clone(),
        owner_references: certificate
            .metadata
            .owner_references
            .clone()
            .unwrap_or_default(),
        message,
    }
}

#[async_trait]
impl CertificateIssuer for CertManagerIssuer {
    async fn create(
        &self,
        request: CertificateRequestSpec,
    ) -> Result<CertificateRequestStatus, AdapterError> {
        let certificate = to_certificate(&request);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };

        match self.api(&request.namespace).create(&params, &certificate).await {
            Ok(created) => {
                debug!(
                    certificate.namespace = %request.namespace,
                    certificate.name = %request.name,
                    "certificate.created"
                );
                Ok(from_certificate(&request.namespace, &created))
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(AdapterError::AlreadyExists {
                    kind: KIND,
                    namespace: request.namespace,
                    name: request.name,
                })
            }
            Err(e) => Err(AdapterError::Api(e)),
        }
    }

    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CertificateRequestStatus>, AdapterError> {
        match self.api(namespace).get(name).await {
            Ok(certificate) => Ok(Some(from_certificate(namespace, &certificate))),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
            Err(e) => Err(AdapterError::Api(e)),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), AdapterError> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(AdapterError::NotFound {
                kind: KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(AdapterError::Api(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{CertificateCondition, CertificateStatus, IssuerRef};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use std::collections::BTreeMap;

    fn request(jks: bool) -> CertificateRequestSpec {
        CertificateRequestSpec {
            name: "test-user".into(),
            namespace: "test-namespace".into(),
            secret_name: "test-secret".into(),
            common_name: "test-user".into(),
            dns_names: vec!["test-user.test-namespace.svc".into()],
            issuer: IssuerRef {
                name: "dataplane-ca".into(),
                kind: "ClusterIssuer".into(),
                group: "cert-manager.io".into(),
            },
            jks_password_key: jks.then(|| "password".to_string()),
            owner: OwnerReference {
                api_version: "security.dataplane.io/v1".into(),
                kind: "ClusterUser".into(),
                name: "test-user".into(),
                uid: "uid-1".into(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            },
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn test_to_certificate_without_jks() {
        let certificate = to_certificate(&request(false));

        assert_eq!(certificate.metadata.name.as_deref(), Some("test-user"));
        assert_eq!(
            certificate.metadata.namespace.as_deref(),
            Some("test-namespace")
        );
        assert_eq!(certificate.spec.secret_name, "test-secret");
        assert_eq!(certificate.spec.common_name.as_deref(), Some("test-user"));
        assert_eq!(certificate.spec.usages, vec!["client auth", "server auth"]);
        assert!(certificate.spec.keystores.is_none());
        assert_eq!(
            certificate
                .metadata
                .owner_references
                .as_ref()
                .map(|refs| refs[0].kind.as_str()),
            Some("ClusterUser")
        );
    }

    #[test]
    fn test_to_certificate_with_jks_references_password_field() {
        let certificate = to_certificate(&request(true));
        let jks = certificate
            .spec
            .keystores
            .and_then(|k| k.jks)
            .expect("jks keystore requested");

        assert!(jks.create);
        assert_eq!(jks.password_secret_ref.name, "test-secret");
        assert_eq!(jks.password_secret_ref.key, "password");
    }

    #[test]
    fn test_from_certificate_reads_ready_condition() {
        let mut certificate = to_certificate(&request(false));
        assert!(!from_certificate("test-namespace", &certificate).ready);

        certificate.status = Some(CertificateStatus {
            conditions: vec![CertificateCondition {
                r#type: "Ready".into(),
                status: "True".into(),
                reason: Some("Ready".into()),
                message: Some("Certificate is up to date and has not expired".into()),
            }],
            not_after: None,
        });

        let status = from_certificate("test-namespace", &certificate);
        assert!(status.ready);
        assert_eq!(status.secret_name, "test-secret");
        assert_eq!(status.owner_references.len(), 1);
        assert!(status.message.is_some());
    }
}
