//! # Status Updates
//!
//! Maps a reconcile outcome onto the `ClusterUser` status and writes it.

use crate::constants::{FIELD_MANAGER, TLS_CERT_KEY};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{ClusterUser, ClusterUserStatus, Condition, UserPhase};
use crate::pki::{codec, UserCertificate};
use kube::api::{Api, Patch, PatchParams};
use tracing::debug;

const READY_CONDITION: &str = "Ready";

/// Status describing `result` for `user`
#[must_use]
pub fn build_status(
    user: &ClusterUser,
    result: &Result<UserCertificate, ReconcilerError>,
    now: chrono::DateTime<chrono::Utc>,
) -> ClusterUserStatus {
    let existing = user.status.as_ref();

    let (phase, ready, reason, message) = match result {
        Ok(_) => (
            UserPhase::Ready,
            true,
            "CertificateReady",
            format!("Certificate bundle in secret {} is ready", user.spec.secret_name),
        ),
        Err(e) if e.is_not_ready() => (UserPhase::Pending, false, "CertificateNotReady", e.to_string()),
        Err(e) => (UserPhase::Failed, false, e.kind(), e.to_string()),
    };
    let status = if ready { "True" } else { "False" };

    // Transition time only moves when the condition status flips
    let previous = existing.and_then(|s| {
        s.conditions
            .iter()
            .find(|c| c.r#type == READY_CONDITION)
    });
    let last_transition_time = match previous {
        Some(condition) if condition.status == status => condition.last_transition_time.clone(),
        _ => Some(now.to_rfc3339()),
    };

    let (certificate_subject, certificate_not_after) = match result {
        Ok(bundle) => match codec::decode_certificate(TLS_CERT_KEY, &bundle.certificate) {
            Ok(decoded) => (
                Some(decoded.subject),
                decoded.not_after.map(|t| t.to_rfc3339()),
            ),
            Err(_) => (None, None),
        },
        // Keep what was last observed while waiting or failing
        Err(_) => (
            existing.and_then(|s| s.certificate_subject.clone()),
            existing.and_then(|s| s.certificate_not_after.clone()),
        ),
    };

    ClusterUserStatus {
        phase: Some(phase),
        message: Some(message.clone()),
        conditions: vec![Condition {
            r#type: READY_CONDITION.to_string(),
            status: status.to_string(),
            last_transition_time,
            reason: Some(reason.to_string()),
            message: Some(message),
        }],
        observed_generation: user.metadata.generation,
        last_reconcile_time: Some(now.to_rfc3339()),
        certificate_subject,
        certificate_not_after,
    }
}

/// True when `desired` differs from `current` in anything but timestamps
#[must_use]
pub fn status_changed(current: Option<&ClusterUserStatus>, desired: &ClusterUserStatus) -> bool {
    let Some(current) = current else {
        return true;
    };

    let strip = |status: &ClusterUserStatus| {
        let mut status = status.clone();
        status.last_reconcile_time = None;
        for condition in &mut status.conditions {
            condition.last_transition_time = None;
        }
        status
    };

    let (current, desired) = (strip(current), strip(desired));
    current.phase != desired.phase
        || current.message != desired.message
        || current.conditions != desired.conditions
        || current.observed_generation != desired.observed_generation
        || current.certificate_subject != desired.certificate_subject
        || current.certificate_not_after != desired.certificate_not_after
}

/// Write the status for `result`, skipping the write when nothing changed
///
/// Unchanged statuses are not patched so status writes do not feed back
/// into the watch as new events.
pub async fn update_status(
    reconciler: &Reconciler,
    user: &ClusterUser,
    result: &Result<UserCertificate, ReconcilerError>,
) -> Result<(), kube::Error> {
    let desired = build_status(user, result, chrono::Utc::now());

    if !status_changed(user.status.as_ref(), &desired) {
        debug!(
            phase = ?desired.phase,
            "Skipping status update - status unchanged"
        );
        return Ok(());
    }

    let api: Api<ClusterUser> = Api::namespaced(
        reconciler.client.clone(),
        user.metadata.namespace.as_deref().unwrap_or("default"),
    );

    let patch = serde_json::json!({
        "status": desired
    });

    api.patch_status(
        user.metadata.name.as_deref().unwrap_or("unknown"),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ClusterUserSpec;
    use crate::pki::PkiError;

    fn user() -> ClusterUser {
        let mut user = ClusterUser::new(
            "test-user",
            ClusterUserSpec {
                secret_name: "test-secret".into(),
                ..ClusterUserSpec::default()
            },
        );
        user.metadata.namespace = Some("test-namespace".into());
        user.metadata.generation = Some(3);
        user
    }

    fn bundle() -> UserCertificate {
        let generated = rcgen::generate_simple_self_signed(vec!["test-user".to_string()])
            .expect("rcgen should generate a certificate");
        UserCertificate {
            ca: generated.cert.pem().into_bytes(),
            certificate: generated.cert.pem().into_bytes(),
            key: generated.key_pair.serialize_pem().into_bytes(),
            jks: None,
        }
    }

    #[test]
    fn test_ready_status_reports_certificate() {
        let now = chrono::Utc::now();
        let status = build_status(&user(), &Ok(bundle()), now);

        assert_eq!(status.phase, Some(UserPhase::Ready));
        assert_eq!(status.observed_generation, Some(3));
        assert_eq!(status.conditions[0].status, "True");
        assert_eq!(
            status.conditions[0].reason.as_deref(),
            Some("CertificateReady")
        );
        assert!(status.certificate_subject.is_some());
        assert!(status.certificate_not_after.is_some());
    }

    #[test]
    fn test_not_ready_status_is_pending() {
        let result = Err(ReconcilerError::from(PkiError::NotReady(
            "secret test-namespace/test-secret has not been provisioned yet".into(),
        )));
        let status = build_status(&user(), &result, chrono::Utc::now());

        assert_eq!(status.phase, Some(UserPhase::Pending));
        assert_eq!(status.conditions[0].status, "False");
        assert_eq!(
            status.conditions[0].reason.as_deref(),
            Some("CertificateNotReady")
        );
    }

    #[test]
    fn test_failure_status_carries_error_kind() {
        let result = Err(ReconcilerError::from(PkiError::Conflict {
            kind: "Certificate",
            namespace: "test-namespace".into(),
            name: "test-user".into(),
            owner: "ClusterIssuer/platform".into(),
            user: "test-user".into(),
        }));
        let status = build_status(&user(), &result, chrono::Utc::now());

        assert_eq!(status.phase, Some(UserPhase::Failed));
        assert_eq!(status.conditions[0].reason.as_deref(), Some("Conflict"));
    }

    #[test]
    fn test_transition_time_kept_while_condition_unchanged() {
        let earlier = chrono::Utc::now() - chrono::Duration::hours(1);
        let mut user = user();
        user.status = Some(build_status(&user, &Ok(bundle()), earlier));

        let status = build_status(&user, &Ok(bundle()), chrono::Utc::now());
        assert_eq!(
            status.conditions[0].last_transition_time,
            Some(earlier.to_rfc3339())
        );
    }

    #[test]
    fn test_status_changed_ignores_timestamps() {
        let user = user();
        let first = build_status(&user, &Ok(bundle()), chrono::Utc::now() - chrono::Duration::minutes(5));
        let mut second = first.clone();
        second.last_reconcile_time = Some(chrono::Utc::now().to_rfc3339());

        assert!(!status_changed(Some(&first), &second));
        assert!(status_changed(None, &second));

        second.phase = Some(UserPhase::Failed);
        assert!(status_changed(Some(&first), &second));
    }
}
