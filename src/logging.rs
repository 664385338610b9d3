use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if let Err(e) = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
        {
            eprintln!("Failed to initialize tracing: {}", e);
        }
    });
}
