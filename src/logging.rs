use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber once. `RUST_LOG`, when set, wins over
/// `default_filter`. Logs go to stderr so stdout stays JSON.
pub fn init(default_filter: &str) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

        let installed = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        if installed.is_err() {
            tracing::debug!("a global subscriber is already installed; keeping it");
        }
    });
}
