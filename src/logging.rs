use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "sqlitebench=info,warn";

/// Installs the stderr subscriber. Later calls are no-ops, so every binary
/// and test may call it.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true);
    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}
