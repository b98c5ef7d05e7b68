//! Process-wide `tracing` setup.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Install a stderr subscriber, once per process.
///
/// `RUST_LOG` wins over `default_filter`. If the host process already set a
/// global subscriber this is a no-op.
pub fn init_logging(default_filter: &str) {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
