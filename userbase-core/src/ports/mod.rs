//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. Services depend
//! only on these traits, not on concrete implementations.

mod cache;
mod event_log;
mod repository;

pub use cache::UserCache;
pub use event_log::EventLog;
pub use repository::UserRepository;
