//! Logging setup
//!
//! Installs a `tracing` fmt subscriber. `RUST_LOG` wins over the configured
//! fallback level.

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_tracing(default_level: &str) -> bool {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .try_init()
        .is_ok()
}

/// JSON lines variant for log shipping
pub fn init_json_tracing(default_level: &str) -> bool {
    fmt()
        .json()
        .with_env_filter(env_filter(default_level))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("info"));
        assert!(!init_json_tracing("info"));
    }
}
