//! Structured logging bring-up shared by the `world` and `scene` binaries
//! (SPEC_FULL.md §11.1).

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. `json` switches between a
/// machine-readable and a human-readable formatter; `RUST_LOG` (or `default`
/// when unset) drives the filter.
pub fn init_logging(json: bool, default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = fmt().with_env_filter(filter);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
