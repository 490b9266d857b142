//! # Reconcile
//!
//! Entry point invoked by the controller runtime for each `ClusterUser`.
//!
//! 1. Deleted users: clean up owned certificate objects, drop the finalizer
//! 2. Ensure the finalizer is present
//! 3. Drive the certificate one step (bounded by the reconcile timeout)
//! 4. Write status when it changed
//! 5. Requeue: resync on success, short interval while not ready,
//!    errors go to the error policy for Fibonacci backoff

use crate::config::ControllerConfig;
use crate::controller::reconciler::finalizer::{add_finalizer, has_finalizer, remove_finalizer};
use crate::controller::reconciler::status::update_status;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::ClusterUser;
use crate::observability;
use crate::pki::{UserCertificate, UserIdentity};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

pub async fn reconcile(
    user: Arc<ClusterUser>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = user.metadata.name.clone().unwrap_or_else(|| "unknown".to_string());
    let namespace = user
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());

    let span = tracing::info_span!(
        "controller.reconcile",
        user.name = name.as_str(),
        user.namespace = namespace.as_str(),
        secret.name = user.spec.secret_name.as_str(),
    );

    async move {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();

        if user.metadata.deletion_timestamp.is_some() {
            return finalize_user(&user, &ctx, &namespace, &name).await;
        }

        if !has_finalizer(&user) {
            add_finalizer(&ctx.client, &namespace, &name).await?;
        }

        let identity = UserIdentity::from(user.as_ref());
        let timeout = ctx.config.reconcile_timeout();
        let result = match tokio::time::timeout(
            timeout,
            ctx.manager.reconcile_user_certificate(&identity),
        )
        .await
        {
            Ok(result) => result.map_err(ReconcilerError::from),
            Err(_) => Err(ReconcilerError::Timeout(timeout)),
        };

        if let Err(e) = update_status(&ctx, &user, &result).await {
            warn!("Failed to update status for {}: {}", name, e);
        }

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let Some(action) = next_action(&result, &ctx.config) else {
            // Real failures go through error_policy for backoff
            return result.map(|_| Action::await_change());
        };

        let resource_key = format!("{namespace}/{name}");
        if ctx.reset_backoff(&resource_key) {
            info!("🔄 Backoff reset for {}: returning to normal schedule", name);
        }

        match &result {
            Ok(_) => {
                let interval = ctx.config.resync_interval();
                info!(
                    "✅ Reconciliation complete for {} (duration: {:.2}s)",
                    name,
                    start.elapsed().as_secs_f64()
                );
                info!(
                    "📅 Next scheduled reconciliation: {} (in {}s, trigger source: resync)",
                    next_trigger_time(interval),
                    interval.as_secs()
                );
                observability::metrics::increment_requeues_total("resync");
            }
            Err(e) => {
                let interval = ctx.config.not_ready_requeue();
                info!("⏳ Certificate for {} not ready: {}", name, e);
                debug!(
                    "Requeueing {} in {}s (trigger source: not-ready)",
                    name,
                    interval.as_secs()
                );
                observability::metrics::increment_not_ready();
                observability::metrics::increment_requeues_total("not-ready");
            }
        }

        Ok(action)
    }
    .instrument(span)
    .await
}

/// Requeue for a settled outcome; `None` for errors that need backoff
#[must_use]
pub fn next_action(
    result: &Result<UserCertificate, ReconcilerError>,
    config: &ControllerConfig,
) -> Option<Action> {
    match result {
        Ok(_) => Some(Action::requeue(config.resync_interval())),
        Err(e) if e.is_not_ready() => Some(Action::requeue(config.not_ready_requeue())),
        Err(_) => None,
    }
}

async fn finalize_user(
    user: &ClusterUser,
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    if !has_finalizer(user) {
        debug!("{} is being deleted without our finalizer, nothing to do", name);
        return Ok(Action::await_change());
    }

    info!("🧹 Cleaning up certificate objects for deleted user {}", name);

    let identity = UserIdentity::from(user);
    let timeout = ctx.config.reconcile_timeout();
    tokio::time::timeout(timeout, ctx.manager.finalize_user_certificate(&identity))
        .await
        .map_err(|_elapsed| ReconcilerError::Timeout(timeout))??;

    remove_finalizer(&ctx.client, namespace, name).await?;
    ctx.reset_backoff(&format!("{namespace}/{name}"));
    observability::metrics::increment_finalizations();

    info!("✅ Finalized user {}", name);
    Ok(Action::await_change())
}

fn next_trigger_time(interval: std::time::Duration) -> String {
    let offset = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(60));
    (chrono::Utc::now() + offset).to_rfc3339()
}
