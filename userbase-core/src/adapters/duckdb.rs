//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::User;
use crate::migrations::MIGRATIONS;
use crate::ports::UserRepository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Timestamp layout written to and read from the `created` column
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

/// Run `op` until it succeeds, retrying lock errors with exponential backoff
///
/// Gives up after `MAX_RETRIES` attempts; other errors return immediately.
fn with_retry<T>(
    initial_delay: Duration,
    mut op: impl FnMut() -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_msg = e.to_string();
                if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                    let delay = initial_delay * 2u32.pow(attempt);
                    warn!(
                        "Database busy, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt + 1,
                        MAX_RETRIES,
                        err_msg
                    );
                    thread::sleep(delay);
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
}

/// Raw row as read from the users table
type UserRow = (i64, String, String, String);

/// DuckDB-backed user repository
pub struct DuckDbUserRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbUserRepository {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff when the file is locked by another
    /// process, e.g. a CLI command running while the server is up.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let conn = with_retry(Duration::from_millis(INITIAL_RETRY_DELAY_MS), || {
            Self::try_open_connection(db_path)
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run pending migrations, returning what was applied
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the backing file, if any
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl UserRepository for DuckDbUserRepository {
    fn insert_user(&self, user: &User) -> Result<i64> {
        let conn = self.lock()?;
        let id: i64 = conn.query_row(
            "INSERT INTO users (name, email, created) VALUES (?, ?, ?) RETURNING id",
            params![user.name, user.email, format_timestamp(&user.created)],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, email, created::VARCHAR FROM users WHERE id = ?")?;
        let mut rows = stmt.query_map([id], read_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row_to_user(row?)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, email, created::VARCHAR FROM users ORDER BY id")?;
        let rows = stmt.query_map([], read_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row_to_user(row?)?);
        }
        Ok(users)
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE users SET name = ?, email = ? WHERE id = ?",
            params![user.name, user.email, user.id],
        )?;
        Ok(changed > 0)
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn read_row(row: &duckdb::Row) -> duckdb::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn row_to_user((id, name, email, created): UserRow) -> Result<User> {
    Ok(User {
        id,
        name,
        email,
        created: parse_timestamp(&created)?,
    })
}

// Helper functions

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    // DuckDB drops the fractional part entirely when it is zero
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::database(format!("invalid timestamp '{}': {}", s, e)))
}
