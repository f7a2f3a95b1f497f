//! Shared tracing bootstrap for binaries and tests embedding the engine.

use crate::{Error, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize the global tracing subscriber for a component.
///
/// JSON-formatted output with targets and thread ids, suitable for log
/// shipping. Fails if a subscriber is already installed.
pub fn init_for_component(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)?;
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize tracing subscriber: {e}")))
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}
