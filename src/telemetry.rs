//! Structured logging bootstrap. Mirrors the teacher crate's `init_env` in shape (an `EnvFilter`
//! defaulting to `INFO`, composed through `Registry::default().with(...).init()`) but drops the
//! TUI-only `CaptureLayer`/file-appender machinery in favor of a single stdout layer, since the
//! bridge is a headless server rather than an interactive terminal application.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use crate::config::LogConfig;

/// Initializes the global `tracing` subscriber. Call once, at the start of `main`.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.format == "json" {
        let layer = tracing_subscriber::fmt::layer().json();
        Registry::default().with(layer).with(filter).init();
    } else {
        let layer = tracing_subscriber::fmt::layer();
        Registry::default().with(layer).with(filter).init();
    }
}
