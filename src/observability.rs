//! Logging setup. The capability registry and plugin lifecycle log through
//! `tracing` directly (see `probeforge-registry` and `probeforge-plugins`);
//! this just wires up a subscriber the same way a binary entry point
//! typically does for its own logging, filterable with `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}
