pub mod app;
pub mod core;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging once, before any component runs.
pub fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,openlock_lib=debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
