//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use crate::crd::IssuerRef;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller namespace
    /// Namespace where the controller is deployed
    pub controller_namespace: String,
    /// Upper bound for one reconcile call (seconds)
    /// The in-flight reconcile future is dropped once this elapses
    pub reconcile_timeout_secs: u64,
    /// Requeue interval after a successful reconcile (seconds)
    pub resync_interval_secs: u64,
    /// Requeue interval while the certificate is not ready yet (seconds)
    /// Not-ready outcomes are not errors and never enter the backoff sequence
    pub not_ready_requeue_secs: u64,
    /// Fibonacci backoff floor for failed reconciles (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling for failed reconciles (minutes)
    pub backoff_max_minutes: u64,
    /// Watch stream restart delay after the stream ends or fails (seconds)
    pub watch_restart_delay_secs: u64,
    /// Initial backoff after a watch stream error (milliseconds)
    pub watch_backoff_start_ms: u64,
    /// Ceiling for the doubling watch stream backoff (milliseconds)
    pub watch_backoff_max_ms: u64,
    /// Issuer used for externally issued certificates when the user does not name one
    pub default_issuer_name: String,
    /// Kind of the default issuer (`Issuer` or `ClusterIssuer`)
    pub default_issuer_kind: String,
    /// API group of the default issuer
    pub default_issuer_group: String,
    /// Watch cert-manager `Certificate` objects owned by users
    /// Disable on clusters without cert-manager installed
    pub watch_certificates: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            controller_namespace: "dataplane-system".to_string(),
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            not_ready_requeue_secs: DEFAULT_NOT_READY_REQUEUE_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_backoff_start_ms: DEFAULT_WATCH_BACKOFF_START_MS,
            watch_backoff_max_ms: DEFAULT_WATCH_BACKOFF_MAX_MS,
            default_issuer_name: DEFAULT_ISSUER_NAME.to_string(),
            default_issuer_kind: DEFAULT_ISSUER_KIND.to_string(),
            default_issuer_group: DEFAULT_ISSUER_GROUP.to_string(),
            watch_certificates: true,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            controller_namespace: env_var_or_default_str("POD_NAMESPACE", "dataplane-system"),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            not_ready_requeue_secs: env_var_or_default(
                "NOT_READY_REQUEUE_SECS",
                DEFAULT_NOT_READY_REQUEUE_SECS,
            ),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_backoff_start_ms: env_var_or_default(
                "WATCH_BACKOFF_START_MS",
                DEFAULT_WATCH_BACKOFF_START_MS,
            ),
            watch_backoff_max_ms: env_var_or_default(
                "WATCH_BACKOFF_MAX_MS",
                DEFAULT_WATCH_BACKOFF_MAX_MS,
            ),
            default_issuer_name: env_var_or_default_str("DEFAULT_ISSUER_NAME", DEFAULT_ISSUER_NAME),
            default_issuer_kind: env_var_or_default_str("DEFAULT_ISSUER_KIND", DEFAULT_ISSUER_KIND),
            default_issuer_group: env_var_or_default_str(
                "DEFAULT_ISSUER_GROUP",
                DEFAULT_ISSUER_GROUP,
            ),
            watch_certificates: env_var_or_default_bool("WATCH_CERTIFICATES", true),
        }
    }

    /// Issuer applied to users that do not set `spec.issuerRef`
    #[must_use]
    pub fn default_issuer(&self) -> IssuerRef {
        IssuerRef {
            name: self.default_issuer_name.clone(),
            kind: self.default_issuer_kind.clone(),
            group: self.default_issuer_group.clone(),
        }
    }

    /// Get reconcile timeout duration
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get resync interval duration
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get not-ready requeue duration
    #[must_use]
    pub fn not_ready_requeue(&self) -> Duration {
        Duration::from_secs(self.not_ready_requeue_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_issuer_uses_configured_values() {
        let config = ControllerConfig {
            default_issuer_name: "team-ca".to_string(),
            default_issuer_kind: "Issuer".to_string(),
            ..ControllerConfig::default()
        };

        let issuer = config.default_issuer();
        assert_eq!(issuer.name, "team-ca");
        assert_eq!(issuer.kind, "Issuer");
        assert_eq!(issuer.group, "cert-manager.io");
    }

    #[test]
    fn test_durations_follow_seconds_fields() {
        let config = ControllerConfig::default();
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(30));
        assert_eq!(config.resync_interval(), Duration::from_secs(300));
        assert_eq!(config.not_ready_requeue(), Duration::from_secs(15));
    }
}
