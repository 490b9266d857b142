//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::issuance::CertManagerIssuer;
use crate::pki::{PkiError, UserCertificateManager};
use crate::store::KubeSecretStore;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Certificate(#[from] PkiError),

    #[error("Reconciliation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcilerError {
    /// `NotReady` is a wait state, not a failure
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ReconcilerError::Certificate(e) if e.is_not_ready())
    }

    /// Status reason and metric label for this error
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Certificate(e) => e.kind(),
            ReconcilerError::Timeout(_) => "Timeout",
            ReconcilerError::Kube(_) => "ApiError",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Certificate manager wired to the Kubernetes API and cert-manager
pub type KubeCertificateManager = UserCertificateManager<KubeSecretStore, CertManagerIssuer>;

pub struct Reconciler {
    pub client: Client,
    pub manager: KubeCertificateManager,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name)
    // Owned by the error_policy() layer, reset here on success
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let manager = UserCertificateManager::new(
            KubeSecretStore::new(client.clone()),
            CertManagerIssuer::new(client.clone()),
            config.default_issuer(),
        );

        Self {
            client,
            manager,
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Advance the backoff for `resource_key`, returning `(seconds, error_count)`
    pub fn next_backoff(&self, resource_key: &str) -> Option<(u64, u32)> {
        let mut states = self.backoff_states.lock().ok()?;
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_minutes, self.config.backoff_max_minutes)
        });
        state.increment_error();
        Some((state.backoff.next_backoff_seconds(), state.error_count))
    }

    /// Clear the backoff for `resource_key`; true when it had recorded errors
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let Ok(mut states) = self.backoff_states.lock() else {
            return false;
        };
        states.remove(resource_key).is_some_and(|state| state.error_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let not_ready = ReconcilerError::from(PkiError::NotReady("waiting".into()));
        assert!(not_ready.is_not_ready());
        assert_eq!(not_ready.kind(), "NotReady");

        let timeout = ReconcilerError::Timeout(Duration::from_secs(30));
        assert!(!timeout.is_not_ready());
        assert_eq!(timeout.kind(), "Timeout");

        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let kube_err = ReconcilerError::from(kube::Error::SerdeError(malformed));
        assert!(!kube_err.is_not_ready());
        assert_eq!(kube_err.kind(), "ApiError");
    }

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(1, 10);
        state.increment_error();
        state.backoff.next_backoff_seconds();
        state.backoff.next_backoff_seconds();

        state.reset();

        assert_eq!(state.error_count, 0);
        assert_eq!(state.backoff.next_backoff_seconds(), 60);
    }
}
