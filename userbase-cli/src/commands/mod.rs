//! CLI command implementations

pub mod fetch;
pub mod logs;
pub mod serve;
pub mod status;
pub mod user;
pub mod work;

use std::path::PathBuf;

use anyhow::{Context, Result};
use userbase_core::services::LogEvent;
use userbase_core::{EntryPoint, LoggingService, UserbaseContext};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "USERBASE_DIR";

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".userbase"))
        .context("Could not find home directory; set USERBASE_DIR")
}

/// Build the context for a command
pub fn get_context(entry_point: EntryPoint) -> Result<UserbaseContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    UserbaseContext::new(&data_dir, entry_point).context("Failed to initialize userbase context")
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors
pub fn log_event(logger: Option<&LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Tokio runtime for the commands that need one
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
