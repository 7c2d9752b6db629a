use std::sync::Once;

use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub fn init() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            )))
            .init();
    });
}
