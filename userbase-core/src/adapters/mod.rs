//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the UserRepository port
//! - In-memory maps for UserRepository and UserCache
//! - reqwest for outbound HTTP fetches

pub mod duckdb;
pub mod fetch;
pub mod memory;
