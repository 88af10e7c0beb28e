//! Logging setup.
//!
//! The library only emits `tracing` events; binaries choose a subscriber.
//! These helpers install a `tracing-subscriber` fmt layer filtered by
//! `RUST_LOG` (falling back to the given default directive).

use tracing_subscriber::EnvFilter;

/// Install a human-readable subscriber.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt().with_env_filter(env_filter(default_directive)).try_init().is_ok()
}

/// Install a JSON subscriber, one object per event.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_json_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_directive))
        .try_init()
        .is_ok()
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        init_tracing("ragkit=debug");
        assert!(!init_json_tracing("ragkit=debug"));
        assert!(!init_tracing("ragkit=debug"));
    }
}
