//! # User PKI Controller
//!
//! Kubernetes controller that keeps each `ClusterUser`'s certificate Secret
//! provisioned and decodable.
//!
//! ## Overview
//!
//! 1. Watches `ClusterUser` resources across all namespaces
//! 2. Creates cert-manager `Certificate` requests for externally issued users
//! 3. Adopts and completes the resulting Secret (JKS password included)
//! 4. Reports certificate subject and expiry in the user status
//!
//! The HTTP server on `METRICS_PORT` serves `/metrics`, `/healthz` and `/readyz`.

use anyhow::Result;
use user_pki_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.users,
        init_result.reconciler,
        init_result.server_state,
    )
    .await
}
