//! Application configuration loaded from environment variables.
//!
//! Every setting is optional:
//! - `VOLSCAN_TRADES_DIR`: directory of per-ticker trade logs (default `trades`)
//! - `VOLSCAN_TOPOLOGY`: `sequential`, `shared` or `isolated` (default `shared`)
//! - `VOLSCAN_MAX_WORKERS`: concurrent scanners (default: available parallelism)
//! - `VOLSCAN_POLL_INTERVAL_MS`: aggregator receive wait (default 250)
//! - `VOLSCAN_OUTPUT`: `text` or `json` (default `text`)

use std::path::PathBuf;
use std::thread::available_parallelism;
use std::time::Duration;

use crate::VolscanError;
use crate::pipeline::Topology;
use crate::report::OutputFormat;

/// Default directory of trade logs, relative to the working directory.
const DEFAULT_TRADES_DIR: &str = "trades";

/// Default aggregator receive wait in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trades_dir: PathBuf,
    pub topology: Topology,
    pub max_workers: usize,
    pub poll_interval: Duration,
    pub output: OutputFormat,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`VolscanError::Config`] if a variable is set to a value that
/// cannot be used.
pub fn fetch_config() -> crate::Result<AppConfig> {
    config_from(non_empty_var)
}

/// Builds the configuration from a variable lookup. Empty values must be
/// reported as absent.
fn config_from<F>(lookup: F) -> crate::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let trades_dir = lookup("VOLSCAN_TRADES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRADES_DIR));

    let topology = match lookup("VOLSCAN_TOPOLOGY") {
        Some(value) => value.parse()?,
        None => Topology::SharedMemory,
    };

    let max_workers = match lookup("VOLSCAN_MAX_WORKERS") {
        Some(value) => positive("VOLSCAN_MAX_WORKERS", &value)?,
        None => available_parallelism().map_or(1, |n| n.get()),
    };

    let poll_interval_ms = match lookup("VOLSCAN_POLL_INTERVAL_MS") {
        Some(value) => positive("VOLSCAN_POLL_INTERVAL_MS", &value)? as u64,
        None => DEFAULT_POLL_INTERVAL_MS,
    };

    let output = match lookup("VOLSCAN_OUTPUT") {
        Some(value) => value.parse()?,
        None => OutputFormat::Text,
    };

    Ok(AppConfig {
        trades_dir,
        topology,
        max_workers,
        poll_interval: Duration::from_millis(poll_interval_ms),
        output,
    })
}

/// Parses a strictly positive integer setting.
fn positive(name: &str, value: &str) -> crate::Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(VolscanError::Config(format!(
            "{name} must be a positive integer, got {value:?}"
        ))),
    }
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
