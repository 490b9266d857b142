//! # Watch Loop
//!
//! Controller watch loop that monitors `ClusterUser` resources and the
//! objects they own, triggering reconciliation when changes are detected.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Certificate, ClusterUser};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Owned Secrets and cert-manager Certificates map back to their
/// `ClusterUser` through the controller owner reference, so an issuer
/// filling in a Secret wakes the owning user right away. The stream is
/// restarted after it ends until shutdown is requested.
pub async fn run_watch_loop(
    users: Api<ClusterUser>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = reconciler.config.clone();
    let backoff_duration_ms = Arc::new(AtomicU64::new(config.watch_backoff_start_ms));

    // Mark not ready on SIGTERM/SIGINT so the loop exits after the current stream
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let client = reconciler.client.clone();
        let backoff = backoff_duration_ms.clone();
        let stream_config = config.clone();

        let mut controller =
            Controller::new(users.clone(), watcher::Config::default().any_semantic())
                .owns(Api::<Secret>::all(client.clone()), watcher::Config::default());
        if config.watch_certificates {
            controller = controller.owns(
                Api::<Certificate>::all(client),
                watcher::Config::default(),
            );
        }

        info!("Starting controller watch loop...");
        controller
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .filter_map(move |x| {
                let backoff = backoff.clone();
                let stream_config = stream_config.clone();
                async move {
                    match &x {
                        Ok((object, _action)) => {
                            backoff.store(stream_config.watch_backoff_start_ms, Ordering::Relaxed);
                            debug!(resource.name = %object.name, "watch.event.success");
                            Some(x)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                stream_config.watch_backoff_max_ms,
                                stream_config.watch_restart_delay_secs,
                            )
                            .await
                            .map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(tracing::info_span!("controller.watch", operation = "watch_loop"))
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = config.watch_restart_delay();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
