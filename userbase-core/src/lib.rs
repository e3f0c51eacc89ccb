//! Userbase Core - user records, a worker pool and the HTTP API over them
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Core entities (User) and the error type
//! - **ports**: Trait definitions for external dependencies (UserRepository, UserCache, EventLog)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, in-memory, reqwest)
//! - **server**: hyper-based HTTP front end

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod server;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use adapters::duckdb::DuckDbUserRepository;
use adapters::memory::{InMemoryUserCache, InMemoryUserRepository};
use config::{Config, StorageBackend};
use ports::{EventLog, UserRepository};
use server::{AppState, Router};

// Re-export commonly used types at crate root
pub use adapters::fetch::Fetcher;
pub use domain::result::{Error, OperationResult};
pub use domain::{NewUser, User, UserPatch};
pub use services::{EntryPoint, LoggingService, UserService, WorkerPool};

/// Main context for Userbase operations
///
/// Holds the resolved configuration and the services built from it.
pub struct UserbaseContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub user_service: Arc<UserService>,
    /// Absent when the log database could not be opened
    pub logging_service: Option<Arc<LoggingService>>,
}

impl UserbaseContext {
    /// Load configuration from `data_dir` and open the configured storage
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let repository: Arc<dyn UserRepository> = match config.storage {
            StorageBackend::Duckdb => {
                let repo = DuckDbUserRepository::new(&data_dir.join("users.duckdb"))?;
                repo.ensure_schema()?;
                Arc::new(repo)
            }
            StorageBackend::Memory => Arc::new(InMemoryUserRepository::new()),
        };
        debug!("Using {} storage", config.storage.as_str());

        // Event logging is best effort; a locked log file must not block the app
        let logging_service =
            match LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION")) {
                Ok(service) => Some(Arc::new(service)),
                Err(e) => {
                    warn!("Event log unavailable: {}", e);
                    None
                }
            };

        let mut user_service = UserService::new(repository, Arc::new(InMemoryUserCache::new()));
        if let Some(logger) = &logging_service {
            user_service = user_service.with_event_log(Arc::clone(logger) as Arc<dyn EventLog>);
        }

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            user_service: Arc::new(user_service),
            logging_service,
        })
    }

    /// Router wired to this context's services and timeouts
    pub fn router(&self) -> Router {
        let mut state = AppState::new(Arc::clone(&self.user_service));
        if let Some(logger) = &self.logging_service {
            state = state.with_event_log(Arc::clone(logger) as Arc<dyn EventLog>);
        }
        Router::new(
            state,
            self.config.server.read_timeout,
            self.config.server.write_timeout,
        )
    }
}
