// bcli-logging/src/lib.rs

//! A small helper to initialize tracing for the bitcoin-cli driver.
//!
//! Usage:
//! ```rust,ignore
//! bcli_logging::init();
//! tracing::info!("driver started");
//! tracing::debug!("detailed state: {:?}", some_struct);
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber:
/// - Reads `RUST_LOG` for filter directives, falling back to `"bcli=info"`.
/// - Uses a pretty-printed, line-based formatter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bcli=info"));

    fmt().with_env_filter(filter).init();
}

/// Same as [`init`], but with an explicit level for callers (like the demo
/// CLI) that take a `--verbose` flag instead of reading `RUST_LOG`.
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_new(format!("bcli={level}"))
        .unwrap_or_else(|_| EnvFilter::new("bcli=info"));

    fmt().with_env_filter(filter).init();
}
