//! # ClusterUser Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the ClusterUser resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUserStatus {
    /// Current phase of reconciliation
    #[serde(default)]
    pub phase: Option<UserPhase>,
    /// Human-readable description of the current state
    #[serde(default)]
    pub message: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Subject of the leaf certificate currently in the Secret
    #[serde(default)]
    pub certificate_subject: Option<String>,
    /// Expiry of the leaf certificate currently in the Secret (RFC3339)
    #[serde(default)]
    pub certificate_not_after: Option<String>,
}

/// Lifecycle phase reported on the ClusterUser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum UserPhase {
    /// Waiting for the certificate bundle to materialize
    Pending,
    /// Certificate bundle is present and decodes
    Ready,
    /// Reconciliation hit an error that needs attention
    Failed,
}

impl UserPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UserPhase::Pending => "Pending",
            UserPhase::Ready => "Ready",
            UserPhase::Failed => "Failed",
        }
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
