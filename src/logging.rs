//! Observability (C10): a single structured logging setup installed once
//! at process start. No global mutable logger — everything downstream
//! logs through `tracing`'s thread-local current-subscriber, following
//! spans and events rather than a package-level logger.

use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber.
///
/// Respects `RUST_LOG` if set, defaulting to `info` otherwise. Log lines
/// are JSON when `json` is `true` (the production shape); otherwise a
/// human-readable, ANSI-colored line format (the local-dev shape).
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
