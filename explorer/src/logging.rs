//! Logging bootstrap for hosts embedding the explorer.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when the variable is unset or invalid.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_once() {
        let _ = init_logging("tidy_explorer=debug");
        assert!(init_logging("info").is_err());
    }
}
