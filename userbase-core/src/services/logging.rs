//! Event log - what happened to which user, stored in `logs.duckdb`
//!
//! Events carry ids and request metadata only, never names or email
//! addresses. Ids come from a DuckDB sequence, so entries are totally
//! ordered per log database.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::ports::EventLog;
use crate::services::MigrationService;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Unix-ms cutoff for entries older than `days` before `now_ms`
///
/// Saturates instead of overflowing, so a huge day count selects nothing
/// rather than wrapping into the future.
pub fn retention_cutoff(now_ms: i64, days: u64) -> i64 {
    let span = i64::try_from(days)
        .unwrap_or(i64::MAX)
        .saturating_mul(DAY_MS);
    now_ms.saturating_sub(span)
}

/// Which front end produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Server,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Server => "server",
        }
    }
}

/// An event to be recorded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    /// Attach the affected user id
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach HTTP request context
    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    /// Attach the CLI command
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub user_id: Option<i64>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            entry_point: row.get(2)?,
            app_version: row.get(3)?,
            platform: row.get(4)?,
            event: row.get(5)?,
            user_id: row.get(6)?,
            method: row.get(7)?,
            path: row.get(8)?,
            command: row.get(9)?,
            error_message: row.get(10)?,
            error_details: row.get(11)?,
        })
    }
}

/// Which entries to read back, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFilter {
    pub limit: usize,
    pub errors_only: bool,
    pub user_id: Option<i64>,
}

impl LogFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            errors_only: false,
            user_id: None,
        }
    }

    /// Only entries carrying an error message
    pub fn errors(mut self) -> Self {
        self.errors_only = true;
        self
    }

    /// Only entries about one user
    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// DuckDB-backed event log
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in `data_dir` and run pending migrations
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;

        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Store an event stamped with this service's entry point and version,
    /// returning the new entry id
    pub fn log(&self, event: LogEvent) -> Result<i64> {
        let conn = self.lock()?;

        let id = conn.query_row(
            r#"
            INSERT INTO sys_logs (
                timestamp, entry_point, app_version, platform,
                event, user_id, method, path, command, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
            duckdb::params![
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                std::env::consts::OS,
                &event.event,
                &event.user_id,
                &event.method,
                &event.path,
                &event.command,
                &event.error_message,
                &event.error_details,
            ],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    /// Entries matching `filter`, newest first
    pub fn entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, entry_point, app_version, platform, event, user_id, \
                    method, path, command, error_message, error_details \
             FROM sys_logs \
             WHERE (NOT ? OR error_message IS NOT NULL) \
               AND (CAST(? AS BIGINT) IS NULL OR user_id = ?) \
             ORDER BY id DESC \
             LIMIT ?",
        )?;
        let entries = stmt
            .query_map(
                duckdb::params![
                    filter.errors_only,
                    filter.user_id,
                    filter.user_id,
                    filter.limit as i64
                ],
                LogEntry::from_row,
            )?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Total number of entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete entries older than the given unix-ms timestamp
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl EventLog for LoggingService {
    fn record(&self, event: LogEvent) -> crate::domain::result::Result<()> {
        self.log(event)
            .map(|_| ())
            .map_err(|e| Error::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path, entry_point: EntryPoint) -> LoggingService {
        LoggingService::new(dir, entry_point, "1.0.0").unwrap()
    }

    #[test]
    fn test_new_creates_empty_log() {
        let dir = tempdir().unwrap();
        let service = open(dir.path(), EntryPoint::Cli);

        assert!(service.db_path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_log_stamps_entry_point_and_version() {
        let dir = tempdir().unwrap();
        let service = open(dir.path(), EntryPoint::Server);

        let id = service
            .log(
                LogEvent::new("user_deleted")
                    .with_user(12)
                    .with_request("DELETE", "/users"),
            )
            .unwrap();

        let entries = service.entries(&LogFilter::recent(10)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].user_id, Some(12));
        assert_eq!(entries[0].method.as_deref(), Some("DELETE"));
        assert_eq!(entries[0].path.as_deref(), Some("/users"));
        assert_eq!(entries[0].entry_point, "server");
        assert_eq!(entries[0].app_version, "1.0.0");
        assert_eq!(entries[0].platform, std::env::consts::OS);
    }

    #[test]
    fn test_entries_newest_first_and_limited() {
        let dir = tempdir().unwrap();
        let service = open(dir.path(), EntryPoint::Cli);

        for name in ["first", "second", "third"] {
            service.log(LogEvent::new(name)).unwrap();
        }

        let entries = service.entries(&LogFilter::recent(2)).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["third", "second"]);
    }

    #[test]
    fn test_filters_errors_and_user() {
        let dir = tempdir().unwrap();
        let service = open(dir.path(), EntryPoint::Cli);

        service.log(LogEvent::new("user_created").with_user(1)).unwrap();
        service.log(LogEvent::new("user_created").with_user(2)).unwrap();
        service
            .record(
                LogEvent::new("user_create_failed")
                    .with_error("failed to save user")
                    .with_error_details("disk full"),
            )
            .unwrap();

        let errors = service.entries(&LogFilter::recent(10).errors()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_details.as_deref(), Some("disk full"));

        let for_user = service.entries(&LogFilter::recent(10).for_user(2)).unwrap();
        assert_eq!(for_user.len(), 1);
        assert_eq!(for_user[0].user_id, Some(2));

        let none = service
            .entries(&LogFilter::recent(10).errors().for_user(2))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_count_and_delete() {
        let dir = tempdir().unwrap();
        let service = open(dir.path(), EntryPoint::Cli);

        for name in ["event1", "event2", "event3"] {
            service.log(LogEvent::new(name)).unwrap();
        }
        assert_eq!(service.count().unwrap(), 3);

        assert_eq!(service.delete_before(0).unwrap(), 0);
        let deleted = service.delete_before(now_ms() + 1000).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_ids_continue_after_reopen() {
        let dir = tempdir().unwrap();
        let first = {
            let service = open(dir.path(), EntryPoint::Cli);
            service.log(LogEvent::new("first")).unwrap()
        };
        let service = open(dir.path(), EntryPoint::Cli);
        let second = service.log(LogEvent::new("second")).unwrap();

        assert_eq!(service.count().unwrap(), 2);
        assert!(second > first);
    }

    #[test]
    fn test_retention_cutoff_saturates() {
        assert_eq!(retention_cutoff(10 * DAY_MS, 3), 7 * DAY_MS);
        assert_eq!(retention_cutoff(5, 0), 5);
        // Far past, never wrapped into the future
        assert_eq!(retention_cutoff(0, u64::MAX), -i64::MAX);
        assert!(retention_cutoff(now_ms(), 200_000_000_000_000) < 0);
    }
}
