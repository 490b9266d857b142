//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `user_pki_reconciliations_total` - Total number of reconciliations
//! - `user_pki_reconciliation_errors_total` - Reconciliation errors by kind
//! - `user_pki_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `user_pki_not_ready_total` - Reconciliations that ended waiting on a dependency
//! - `user_pki_certificate_requests_created_total` - Certificate Requests created
//! - `user_pki_secrets_adopted_total` - Issuer-written Secrets adopted by their user
//! - `user_pki_keystore_passwords_generated_total` - Keystore passwords generated
//! - `user_pki_finalizations_total` - Users finalized on deletion
//! - `user_pki_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "user_pki_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "user_pki_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static NOT_READY_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_not_ready_total",
        "Total number of reconciliations waiting on a dependent resource",
    )
    .expect("Failed to create NOT_READY_TOTAL metric - this should never happen")
});

static CERTIFICATE_REQUESTS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_certificate_requests_created_total",
        "Total number of certificate requests created",
    )
    .expect(
        "Failed to create CERTIFICATE_REQUESTS_CREATED_TOTAL metric - this should never happen",
    )
});

static SECRETS_ADOPTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_secrets_adopted_total",
        "Total number of issuer-written secrets adopted by their user",
    )
    .expect("Failed to create SECRETS_ADOPTED_TOTAL metric - this should never happen")
});

static KEYSTORE_PASSWORDS_GENERATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_keystore_passwords_generated_total",
        "Total number of keystore passwords generated",
    )
    .expect(
        "Failed to create KEYSTORE_PASSWORDS_GENERATED_TOTAL metric - this should never happen",
    )
});

static FINALIZATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "user_pki_finalizations_total",
        "Total number of users finalized on deletion",
    )
    .expect("Failed to create FINALIZATIONS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "user_pki_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(NOT_READY_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_REQUESTS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_ADOPTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYSTORE_PASSWORDS_GENERATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FINALIZATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_not_ready() {
    NOT_READY_TOTAL.inc();
}

pub fn increment_certificate_requests_created() {
    CERTIFICATE_REQUESTS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_adopted() {
    SECRETS_ADOPTED_TOTAL.inc();
}

pub fn increment_keystore_passwords_generated() {
    KEYSTORE_PASSWORDS_GENERATED_TOTAL.inc();
}

pub fn increment_finalizations() {
    FINALIZATIONS_TOTAL.inc();
}

/// Count a requeue; `reason` is one of `resync`, `not-ready`, `error-backoff`
pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // This should not panic - metrics should register successfully
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        let after = RECONCILIATIONS_TOTAL.get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_reconciliation_errors_are_labelled_by_kind() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Conflict"])
            .get();
        increment_reconciliation_errors("Conflict");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Conflict"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_requeues_are_labelled_by_reason() {
        let before = REQUEUES_TOTAL.with_label_values(&["not-ready"]).get();
        increment_requeues_total("not-ready");
        let after = REQUEUES_TOTAL.with_label_values(&["not-ready"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        let before = RECONCILIATION_DURATION.get_sample_count();
        observe_reconciliation_duration(0.25);
        assert_eq!(RECONCILIATION_DURATION.get_sample_count(), before + 1);
    }
}
