//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Secret field holding the PEM-encoded CA certificate
pub const CA_CERT_KEY: &str = "ca.crt";

/// Secret field holding the PEM-encoded leaf certificate
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret field holding the PEM-encoded private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Secret field holding the JKS keystore
pub const JKS_KEYSTORE_KEY: &str = "keystore.jks";

/// Secret field holding the JKS truststore
pub const JKS_TRUSTSTORE_KEY: &str = "truststore.jks";

/// Secret field holding the keystore password
pub const JKS_PASSWORD_KEY: &str = "password";

/// Finalizer placed on every `ClusterUser` handled by this controller
pub const USER_FINALIZER: &str = "security.dataplane.io/user-certificate";

/// Field manager used for server-side patches
pub const FIELD_MANAGER: &str = "user-pki-controller";

/// Label identifying objects created by this controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label carrying the owning user name
pub const USER_LABEL: &str = "security.dataplane.io/user";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default upper bound for a single reconcile call (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Default requeue after a successful reconcile (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default requeue while a certificate is not ready yet (seconds)
pub const DEFAULT_NOT_READY_REQUEUE_SECS: u64 = 15;

/// Default Fibonacci backoff floor for reconciliation errors (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default Fibonacci backoff ceiling for reconciliation errors (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Initial backoff after a watch stream error (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Maximum backoff after repeated watch stream errors (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// Default issuer used for externally issued certificates
pub const DEFAULT_ISSUER_NAME: &str = "dataplane-ca";

/// Default issuer kind used for externally issued certificates
pub const DEFAULT_ISSUER_KIND: &str = "ClusterIssuer";

/// Default issuer API group used for externally issued certificates
pub const DEFAULT_ISSUER_GROUP: &str = "cert-manager.io";
