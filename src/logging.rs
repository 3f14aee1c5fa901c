//! Log subscriber setup for binaries and embedding applications.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! subscriber is installed.

use tracing::Level;

use crate::config::LoggingConfig;

/// Parse a configured level name, falling back to `INFO`.
pub fn parse_level(level: &str) -> Level {
    level.trim().parse::<Level>().unwrap_or(Level::INFO)
}

/// Install a global fmt subscriber if logging is enabled.
///
/// Returns `false` when logging is disabled or a global subscriber was
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_target(true)
        .try_init()
        .is_ok()
}
