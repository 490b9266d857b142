//! # Configuration
//!
//! Controller and HTTP server settings, loaded once at startup from the
//! environment (populated from a ConfigMap via `envFrom` in the deployment).

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| parse_bool(&v))
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
