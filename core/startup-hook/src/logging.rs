//! Diagnostic logging for the hook binary.
//!
//! The collection path must never disturb the host, so nothing is emitted
//! unless `DEBUG_HOOKS` is set (or the caller supplies an explicit
//! `RUST_LOG`). Diagnostics go to stderr, which Claude Code captures per
//! hook invocation.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if startup_core::paths::debug_enabled() {
            EnvFilter::new("startup_core=debug,startup_hook=debug")
        } else {
            EnvFilter::new("off")
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_ansi(false),
        )
        .init();
}
