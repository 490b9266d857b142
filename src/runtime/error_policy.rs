//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::ClusterUser;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Backoff used when the per-resource state cannot be read
const FALLBACK_BACKOFF_SECS: u64 = 60;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing user does not slow
/// down the others. `NotReady` never reaches this function.
pub fn handle_reconciliation_error(
    obj: Arc<ClusterUser>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {:?}", name, error);
    observability::metrics::increment_reconciliation_errors(error.kind());

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = ctx.next_backoff(&resource_key).unwrap_or_else(|| {
        warn!(
            "Failed to lock backoff_states, using default backoff of {}s",
            FALLBACK_BACKOFF_SECS
        );
        (FALLBACK_BACKOFF_SECS, 0)
    });

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or_default());

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s, trigger source: error-backoff)",
        next_trigger_time.to_rfc3339(),
        backoff_seconds
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// How the watch loop should treat a stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401, RBAC revoked or token expired
    Unauthorized,
    /// 410, resource version expired
    Expired,
    /// 429, API server storage reinitializing
    Throttled,
    /// 404, object deleted or CRD missing
    NotFound,
    Other,
}

/// Classify a watch stream error by its debug representation
///
/// 404 is checked before 401: a plain-text 404 body surfaces as a serde
/// error that also mentions `WatchFailed`.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        WatchErrorClass::Unauthorized
    } else if is_410 {
        WatchErrorClass::Expired
    } else if is_429 {
        WatchErrorClass::Throttled
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Other
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::warn_span!("controller.watch.error", error = %error_string);

    match classify_watch_error(error_string) {
        WatchErrorClass::Unauthorized => {
            {
                let _error_guard = error_span.enter();
                error!(
                    "❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
                );
                error!("🔍 SRE Diagnostics:");
                error!("   1. Verify ClusterRole 'user-pki-controller' still exists:");
                error!("      kubectl get clusterrole user-pki-controller");
                error!("   2. Verify ClusterRoleBinding still binds ServiceAccount:");
                error!("      kubectl get clusterrolebinding user-pki-controller -o yaml");
                error!("   3. Verify RBAC permissions are still active:");
                error!(
                    "      kubectl auth can-i list clusterusers --as=system:serviceaccount:dataplane-system:user-pki-controller --all-namespaces"
                );
                error!("   4. If RBAC was recently changed, restart the controller pod");
                warn!(
                    "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                    watch_restart_delay_secs
                );
            }
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorClass::Expired => {
            let _error_guard = error_span.enter();
            warn!(
                "Watch resource version expired (410) - this is normal during pod restarts, watch will restart"
            );
            None
        }
        WatchErrorClass::Throttled => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            {
                let _error_guard = error_span.enter();
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms before restart...",
                    current_backoff
                );
            }
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            backoff.store(next_watch_backoff(current_backoff, max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorClass::NotFound => {
            let _error_guard = error_span.enter();
            let resource_info = if error_string.contains("integer `404`") {
                "CRD or resource may have been deleted (404 returned as plain text)"
            } else if error_string.contains("ClusterUser") {
                "ClusterUser resource"
            } else if error_string.contains("Certificate") {
                "cert-manager Certificate resource"
            } else {
                "Resource"
            };
            warn!(
                "{} not found (404) - this may be normal if resource was deleted or CRD is missing. Error: {}",
                resource_info, error_string
            );
            Some(())
        }
        WatchErrorClass::Other => {
            {
                let _error_guard = error_span.enter();
                error!("Controller stream error: {}", error_string);
            }
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}

/// Doubling backoff, capped at `max_backoff_ms`
#[must_use]
pub fn next_watch_backoff(current_ms: u64, max_backoff_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_backoff_ms)
}
