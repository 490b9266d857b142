//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::ClusterUser;
use crate::observability;
use anyhow::Result;
use kube::{api::Api, api::ListParams, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for `ClusterUser` resources across all namespaces
    pub users: Api<ClusterUser>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("config", &self.reconciler.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
/// - Reconcile existing resources
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_pki_controller=info".into()),
        )
        .init();

    info!("Starting User PKI Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_config = ServerConfig::from_env();
    let controller_config = ControllerConfig::from_env();
    info!(
        "Configuration: metrics_port={}, reconcile_timeout={}s, resync_interval={}s, default_issuer={}/{}",
        server_config.metrics_port,
        controller_config.reconcile_timeout_secs,
        controller_config.resync_interval_secs,
        controller_config.default_issuer_kind,
        controller_config.default_issuer_name
    );

    let server_state = Arc::new(ServerState::default());

    // Start HTTP server for metrics and probes
    let server_state_clone = server_state.clone();
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default().await?;

    // Watch all namespaces
    let users: Api<ClusterUser> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(client.clone(), controller_config));

    // Users created before the controller started are picked up here
    reconcile_existing_resources(&users, &reconciler)
        .instrument(tracing::info_span!(
            "controller.startup.reconcile_existing",
            operation = "reconcile_existing_resources"
        ))
        .await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        users,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Group resource names by namespace, both sorted
fn summarize_by_namespace(users: &[ClusterUser]) -> BTreeMap<String, Vec<String>> {
    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for user in users {
        let namespace = user.metadata.namespace.as_deref().unwrap_or("default");
        let name = user.metadata.name.as_deref().unwrap_or("unknown");
        by_namespace
            .entry(namespace.to_string())
            .or_default()
            .push(name.to_string());
    }
    for names in by_namespace.values_mut() {
        names.sort();
    }
    by_namespace
}

/// Reconcile existing `ClusterUser` resources before starting the watch
async fn reconcile_existing_resources(users: &Api<ClusterUser>, reconciler: &Arc<Reconciler>) {
    let list = match users.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
            return;
        }
    };

    if list.items.is_empty() {
        info!("No existing ClusterUser resources found, watch will pick up new resources");
        return;
    }

    let by_namespace = summarize_by_namespace(&list.items);
    info!("User PKI Controller - Startup Resource Summary");
    info!("Resource Kind: ClusterUser");
    info!("Total Resources: {}", list.items.len());
    info!("Namespaces: {}", by_namespace.len());
    for (namespace, names) in &by_namespace {
        info!("Namespace: {}", namespace);
        if names.len() <= 3 {
            info!("  Resources ({}): {}", names.len(), names.join(", "));
        } else {
            info!(
                "  Resources ({}): {}, ... ({} total)",
                names.len(),
                names[..3].join(", "),
                names.len()
            );
        }
    }

    info!(
        "Reconciling {} existing ClusterUser resources before starting watch...",
        list.items.len()
    );

    for item in &list.items {
        let name = item.metadata.name.as_deref().unwrap_or("unknown");
        let namespace = item.metadata.namespace.as_deref().unwrap_or("default");

        match reconcile(Arc::new(item.clone()), reconciler.clone()).await {
            Ok(_action) => {
                info!(
                    resource.name = name,
                    resource.namespace = namespace,
                    "reconciliation.success"
                );
            }
            Err(e) => {
                // Continue with other resources even if one fails
                error!(resource.name = name, resource.namespace = namespace, error = %e, "reconciliation.error");
            }
        }
    }

    info!(
        "Completed reconciliation of {} existing resources",
        list.items.len()
    );
}
