//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "server": { "host": "0.0.0.0", "port": 8080, "readTimeoutSecs": 15, "writeTimeoutSecs": 15 },
//!   "workers": { "count": 3, "delayMs": 100 },
//!   "storage": { "backend": "duckdb" }
//! }
//! ```
//! Every field is optional and unknown keys are ignored. `USERBASE_PORT`,
//! `USERBASE_HOST` and `USERBASE_STORAGE` override the file.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::server::ServerConfig;
use crate::services::WorkerPool;

/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "USERBASE_PORT";
/// Environment variable overriding the listen host
pub const HOST_ENV: &str = "USERBASE_HOST";
/// Environment variable overriding the storage backend
pub const STORAGE_ENV: &str = "USERBASE_STORAGE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    workers: WorkerSettings,
    #[serde(default)]
    storage: StorageSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettings {
    host: Option<String>,
    port: Option<u16>,
    read_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerSettings {
    count: Option<usize>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageSettings {
    backend: Option<StorageBackend>,
}

/// Where user records are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `users.duckdb` in the data directory
    #[default]
    Duckdb,
    /// Process memory; lost on exit
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Duckdb => "duckdb",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(StorageBackend::Duckdb),
            "memory" => Ok(StorageBackend::Memory),
            other => {
                anyhow::bail!("Unknown storage backend '{}' (expected duckdb or memory)", other)
            }
        }
    }
}

/// Userbase configuration (resolved view of settings + environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub worker_count: usize,
    pub work_delay: Duration,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(SettingsFile::default())
    }
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    ///
    /// A malformed settings file is an error rather than silently ignored.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {:?}", settings_path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file {:?}", settings_path))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn from_settings(raw: SettingsFile) -> Self {
        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: raw.server.host.unwrap_or(defaults.host),
            port: raw.server.port.unwrap_or(defaults.port),
            read_timeout: raw
                .server
                .read_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            write_timeout: raw
                .server
                .write_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.write_timeout),
        };

        let pool = WorkerPool::default();
        Self {
            server,
            worker_count: raw.workers.count.unwrap_or(pool.size()),
            work_delay: raw
                .workers
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(pool.delay()),
            storage: raw.storage.backend.unwrap_or_default(),
        }
    }

    /// Apply `USERBASE_*` overrides looked up through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var(PORT_ENV) {
            self.server.port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", PORT_ENV, port))?;
        }
        if let Some(host) = var(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(backend) = var(STORAGE_ENV) {
            self.storage = backend
                .parse()
                .with_context(|| format!("Invalid {}", STORAGE_ENV))?;
        }
        Ok(())
    }

    /// Worker pool built from the configured size and delay
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.worker_count, self.work_delay)
    }
}
