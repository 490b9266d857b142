//! # User Certificate Manager
//!
//! Converges one user's certificate state and cleans it up on deletion.
//!
//! State is re-derived from the adapters on every call; nothing is persisted
//! between calls. Each call performs at most one mutating step and then
//! reports `NotReady`, so an interrupted call is finished by the next one.
//!
//! Classification order:
//!
//! 1. Conflict: a Certificate Request at the user's name controlled by someone else,
//!    or (external issuance) a Secret at `secretName` controlled by someone else
//! 2. NoRequest (external issuance): create the request
//! 3. SecretAbsent: wait for the issuer or the external provisioner
//! 4. Secret adoption and keystore password (external issuance)
//! 5. Secret incomplete: wait
//! 6. SecretPresent: decode and return the bundle

use crate::constants::{
    CA_CERT_KEY, JKS_KEYSTORE_KEY, JKS_PASSWORD_KEY, JKS_TRUSTSTORE_KEY, TLS_CERT_KEY,
    TLS_PRIVATE_KEY_KEY,
};
use crate::crd::IssuerRef;
use crate::issuance::{CertificateIssuer, CertificateRequestSpec, CertificateRequestStatus};
use crate::observability;
use crate::pki::binding::{OwnerBinding, Ownership};
use crate::pki::bundle::{JksBundle, UserCertificate};
use crate::pki::codec;
use crate::pki::error::{AdapterError, PkiError};
use crate::pki::identity::UserIdentity;
use crate::store::{SecretStore, StoredSecret};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Reconciler and finalizer for user certificates
pub struct UserCertificateManager<S, I> {
    secrets: S,
    issuer: I,
    default_issuer: IssuerRef,
}

impl<S, I> std::fmt::Debug for UserCertificateManager<S, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCertificateManager")
            .field("default_issuer", &self.default_issuer)
            .finish_non_exhaustive()
    }
}

impl<S: SecretStore, I: CertificateIssuer> UserCertificateManager<S, I> {
    pub fn new(secrets: S, issuer: I, default_issuer: IssuerRef) -> Self {
        Self {
            secrets,
            issuer,
            default_issuer,
        }
    }

    pub fn secrets(&self) -> &S {
        &self.secrets
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    /// Drive the user's certificate one step toward the ready state
    ///
    /// Returns the decoded bundle once the Secret is complete. `NotReady`
    /// means a dependency is still materializing; call again later.
    pub async fn reconcile_user_certificate(
        &self,
        user: &UserIdentity,
    ) -> Result<UserCertificate, PkiError> {
        user.validate()?;
        let binding = OwnerBinding::resolve(user);

        let request = self
            .issuer
            .get(&user.namespace, &binding.request_name)
            .await?;

        // Conflicts are reported before any not-ready state
        if let Some(existing) = &request {
            ensure_request_owned(user, &binding, existing)?;
        }

        let secret = self
            .secrets
            .get(&user.namespace, &user.secret_name)
            .await?;

        if user.is_external() {
            // A Secret held by another controller must never be handed to the issuer
            if let Some(existing) = &secret {
                ensure_secret_not_foreign(user, &binding, existing)?;
            }

            match &request {
                None => {
                    self.create_request(user, &binding).await?;
                    return Err(PkiError::NotReady(format!(
                        "certificate request {}/{} created, waiting for issuer",
                        user.namespace, binding.request_name
                    )));
                }
                Some(existing) if existing.secret_name != user.secret_name => {
                    warn!(
                        user.name = %user.name,
                        user.namespace = %user.namespace,
                        request.secret = %existing.secret_name,
                        secret.name = %user.secret_name,
                        "⚠️  Certificate request targets a different secret than the user spec; using the user spec"
                    );
                }
                Some(_) => {}
            }
        }

        let Some(secret) = secret else {
            return self.handle_absent_secret(user, &binding, request.as_ref()).await;
        };

        let secret = if user.is_external() {
            self.ensure_secret_bound(user, &binding, secret).await?
        } else {
            secret
        };

        let missing = missing_fields(user, &secret);
        if !missing.is_empty() {
            let pending = request.as_ref().is_some_and(|r| !r.ready);
            return Err(PkiError::NotReady(format!(
                "secret {}/{} is missing {}{}",
                user.namespace,
                user.secret_name,
                missing.join(", "),
                if pending { " (certificate request pending)" } else { "" }
            )));
        }

        let bundle = decode_bundle(user, &secret)?;
        debug!(
            user.name = %user.name,
            user.namespace = %user.namespace,
            secret.name = %user.secret_name,
            "user certificate is ready"
        );
        Ok(bundle)
    }

    /// Remove what was created for the user
    ///
    /// Only objects the user controls are deleted. Missing objects and the
    /// empty identity are not errors.
    pub async fn finalize_user_certificate(&self, user: &UserIdentity) -> Result<(), PkiError> {
        if user.is_empty() {
            debug!("Finalizing empty user identity, nothing to clean up");
            return Ok(());
        }

        let binding = OwnerBinding::resolve(user);

        if let Some(request) = self
            .issuer
            .get(&user.namespace, &binding.request_name)
            .await?
        {
            match binding.ownership(&request.owner_references) {
                Ownership::Owned => {
                    ignore_not_found(
                        self.issuer
                            .delete(&user.namespace, &binding.request_name)
                            .await,
                    )?;
                    info!(
                        user.name = %user.name,
                        user.namespace = %user.namespace,
                        "Deleted certificate request {}",
                        binding.request_name
                    );
                }
                other => {
                    warn!(
                        user.name = %user.name,
                        user.namespace = %user.namespace,
                        "⚠️  Leaving certificate request {} in place, controlled by {}",
                        binding.request_name,
                        other.describe_owner()
                    );
                }
            }
        }

        if user.secret_name.is_empty() {
            return Ok(());
        }

        if let Some(secret) = self
            .secrets
            .get(&user.namespace, &user.secret_name)
            .await?
        {
            if binding.ownership(&secret.owner_references) == Ownership::Owned {
                ignore_not_found(
                    self.secrets
                        .delete(&user.namespace, &user.secret_name)
                        .await,
                )?;
                info!(
                    user.name = %user.name,
                    user.namespace = %user.namespace,
                    secret.name = %user.secret_name,
                    "Deleted user secret"
                );
            } else {
                debug!(
                    secret.name = %user.secret_name,
                    "Secret is not controlled by the user, leaving it in place"
                );
            }
        }

        Ok(())
    }

    async fn create_request(
        &self,
        user: &UserIdentity,
        binding: &OwnerBinding,
    ) -> Result<(), PkiError> {
        let spec = CertificateRequestSpec {
            name: binding.request_name.clone(),
            namespace: user.namespace.clone(),
            secret_name: user.secret_name.clone(),
            common_name: user.name.clone(),
            dns_names: user.dns_names.clone(),
            issuer: user
                .issuer_ref
                .clone()
                .unwrap_or_else(|| self.default_issuer.clone()),
            jks_password_key: user.include_jks.then(|| JKS_PASSWORD_KEY.to_string()),
            owner: binding.owner.clone(),
            labels: binding.labels.clone(),
        };

        match self.issuer.create(spec).await {
            Ok(_) => {
                info!(
                    user.name = %user.name,
                    user.namespace = %user.namespace,
                    "✅ Created certificate request {}",
                    binding.request_name
                );
                observability::metrics::increment_certificate_requests_created();
                Ok(())
            }
            Err(AdapterError::AlreadyExists { .. }) => {
                // Lost a race with a concurrent reconcile or another actor
                match self
                    .issuer
                    .get(&user.namespace, &binding.request_name)
                    .await?
                {
                    Some(existing) => ensure_request_owned(user, binding, &existing),
                    None => Ok(()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_absent_secret(
        &self,
        user: &UserIdentity,
        binding: &OwnerBinding,
        request: Option<&CertificateRequestStatus>,
    ) -> Result<UserCertificate, PkiError> {
        if !user.is_external() {
            return Err(PkiError::NotReady(format!(
                "secret {}/{} has not been provisioned yet",
                user.namespace, user.secret_name
            )));
        }

        if user.include_jks {
            // The issuer reads the keystore password from the user secret, so it
            // has to exist before the first issuance
            let seed = StoredSecret {
                namespace: user.namespace.clone(),
                name: user.secret_name.clone(),
                data: BTreeMap::from([(JKS_PASSWORD_KEY.to_string(), generate_password())]),
                owner_references: vec![binding.owner.clone()],
                labels: binding.labels.clone(),
                resource_version: None,
            };
            match self.secrets.create(seed).await {
                Ok(_) => {
                    info!(
                        user.name = %user.name,
                        user.namespace = %user.namespace,
                        secret.name = %user.secret_name,
                        "Created secret with generated keystore password"
                    );
                    observability::metrics::increment_keystore_passwords_generated();
                }
                Err(AdapterError::AlreadyExists { .. }) => {
                    debug!(secret.name = %user.secret_name, "Secret appeared concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let state = if request.is_some_and(|r| r.ready) {
            "ready"
        } else {
            "pending"
        };
        Err(PkiError::NotReady(format!(
            "waiting for issuer to write secret {}/{} (certificate request {})",
            user.namespace, user.secret_name, state
        )))
    }

    /// Take ownership of an issuer-written secret and make sure it carries a
    /// keystore password when JKS output is requested
    async fn ensure_secret_bound(
        &self,
        user: &UserIdentity,
        binding: &OwnerBinding,
        secret: StoredSecret,
    ) -> Result<StoredSecret, PkiError> {
        let adopt = match binding.ownership(&secret.owner_references) {
            Ownership::Owned => false,
            Ownership::Unowned => true,
            foreign @ Ownership::Foreign(_) => return Err(secret_conflict(user, &foreign)),
        };
        let inject_password = user.include_jks && secret.field(JKS_PASSWORD_KEY).is_none();

        if !adopt && !inject_password {
            return Ok(secret);
        }

        let mut patch = StoredSecret {
            namespace: secret.namespace.clone(),
            name: secret.name.clone(),
            owner_references: if adopt {
                binding.adopt(&secret.owner_references)
            } else {
                secret.owner_references.clone()
            },
            resource_version: secret.resource_version.clone(),
            ..StoredSecret::default()
        };
        if inject_password {
            patch
                .data
                .insert(JKS_PASSWORD_KEY.to_string(), generate_password());
        }

        let updated = match self.secrets.update(patch).await {
            Ok(updated) => updated,
            Err(e @ (AdapterError::Stale { .. } | AdapterError::NotFound { .. })) => {
                return Err(PkiError::NotReady(format!(
                    "secret {}/{} changed while updating it: {e}",
                    user.namespace, user.secret_name
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if adopt {
            info!(
                user.name = %user.name,
                user.namespace = %user.namespace,
                secret.name = %user.secret_name,
                "Adopted issuer-written secret"
            );
            observability::metrics::increment_secrets_adopted();
        }

        if inject_password {
            observability::metrics::increment_keystore_passwords_generated();
            return Err(PkiError::NotReady(format!(
                "generated keystore password for secret {}/{}, waiting for issuer to render keystore",
                user.namespace, user.secret_name
            )));
        }

        Ok(updated)
    }
}

fn ensure_request_owned(
    user: &UserIdentity,
    binding: &OwnerBinding,
    request: &CertificateRequestStatus,
) -> Result<(), PkiError> {
    match binding.ownership(&request.owner_references) {
        Ownership::Owned => Ok(()),
        other => Err(PkiError::Conflict {
            kind: "Certificate",
            namespace: user.namespace.clone(),
            name: binding.request_name.clone(),
            owner: other.describe_owner(),
            user: user.name.clone(),
        }),
    }
}

fn ensure_secret_not_foreign(
    user: &UserIdentity,
    binding: &OwnerBinding,
    secret: &StoredSecret,
) -> Result<(), PkiError> {
    if binding.is_conflict(&secret.owner_references) {
        return Err(secret_conflict(
            user,
            &binding.ownership(&secret.owner_references),
        ));
    }
    Ok(())
}

fn secret_conflict(user: &UserIdentity, ownership: &Ownership) -> PkiError {
    PkiError::Conflict {
        kind: "Secret",
        namespace: user.namespace.clone(),
        name: user.secret_name.clone(),
        owner: ownership.describe_owner(),
        user: user.name.clone(),
    }
}

fn required_fields(user: &UserIdentity) -> Vec<&'static str> {
    let mut fields = vec![CA_CERT_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY];
    if user.include_jks {
        fields.extend([JKS_KEYSTORE_KEY, JKS_TRUSTSTORE_KEY, JKS_PASSWORD_KEY]);
    }
    fields
}

fn missing_fields(user: &UserIdentity, secret: &StoredSecret) -> Vec<&'static str> {
    required_fields(user)
        .into_iter()
        .filter(|field| secret.field(field).is_none())
        .collect()
}

fn field<'a>(secret: &'a StoredSecret, key: &str) -> &'a [u8] {
    secret.field(key).unwrap_or_default()
}

fn decode_bundle(user: &UserIdentity, secret: &StoredSecret) -> Result<UserCertificate, PkiError> {
    let ca = field(secret, CA_CERT_KEY);
    let certificate = field(secret, TLS_CERT_KEY);
    let key = field(secret, TLS_PRIVATE_KEY_KEY);

    codec::decode_certificate(CA_CERT_KEY, ca)?;
    codec::decode_certificate(TLS_CERT_KEY, certificate)?;
    codec::decode_key(TLS_PRIVATE_KEY_KEY, key)?;

    let jks = if user.include_jks {
        let keystore = field(secret, JKS_KEYSTORE_KEY);
        let truststore = field(secret, JKS_TRUSTSTORE_KEY);
        let password = field(secret, JKS_PASSWORD_KEY);
        codec::check_opaque(JKS_KEYSTORE_KEY, keystore)?;
        codec::check_opaque(JKS_TRUSTSTORE_KEY, truststore)?;
        codec::check_opaque(JKS_PASSWORD_KEY, password)?;
        Some(JksBundle {
            keystore: keystore.to_vec(),
            truststore: truststore.to_vec(),
            password: password.to_vec(),
        })
    } else {
        None
    };

    Ok(UserCertificate {
        ca: ca.to_vec(),
        certificate: certificate.to_vec(),
        key: key.to_vec(),
        jks,
    })
}

fn ignore_not_found(result: Result<(), AdapterError>) -> Result<(), AdapterError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

fn generate_password() -> Vec<u8> {
    uuid::Uuid::new_v4().simple().to_string().into_bytes()
}
