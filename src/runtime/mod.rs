//! # Runtime
//!
//! Process-level wiring: startup, the controller watch loop, and error policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
