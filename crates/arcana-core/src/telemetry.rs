//! Log output for the `arcana` binary.
//!
//! Readings print to stdout, so every log line goes to stderr. Verbosity
//! comes from `ARCANA_LOG`, then `RUST_LOG`, then the level the caller
//! passes in. A process gets one global subscriber; later installs are
//! no-ops.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Engine-specific filter variable, read before `RUST_LOG`.
pub const LOG_ENV: &str = "ARCANA_LOG";

/// Install the stderr subscriber, as JSON lines when `json` is set.
pub fn init_tracing(json: bool, level: Level) {
    let filter = log_filter(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        level,
    );
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("subscriber already installed; keeping it");
    }
}

/// First directive string that parses wins; `fallback` otherwise.
fn log_filter(engine: Option<&str>, rust_log: Option<&str>, fallback: Level) -> EnvFilter {
    [engine, rust_log]
        .into_iter()
        .flatten()
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback.as_str()))
}
