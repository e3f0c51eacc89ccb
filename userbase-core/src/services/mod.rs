//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions.

pub mod logging;
pub mod migration;
mod user;
pub mod worker;

pub use logging::{EntryPoint, LogEntry, LogEvent, LogFilter, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use user::UserService;
pub use worker::{WorkerPool, DEFAULT_WORK_DELAY};
