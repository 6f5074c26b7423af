//! Logging setup.
//!
//! Structured logging through `tracing`, with the filter taken from the
//! config file unless `RUST_LOG` or a CLI override says otherwise.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Initialize the global tracing subscriber.
///
/// `level_override` wins over the configured level; the `RUST_LOG`
/// environment variable wins over both.
pub fn setup_logging(settings: &LoggingSettings, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&settings.level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if settings.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}
