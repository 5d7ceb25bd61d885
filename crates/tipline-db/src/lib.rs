//! SQLite-backed store for journalist accounts, sources, and their
//! conversation items.
//!
//! A single [`Connection`] behind a mutex serializes every write, which is
//! what lets reply sequence numbers be assigned without gaps or duplicates.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::info;

pub mod accounts;
pub mod conversation;
pub mod migrations;
pub mod models;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if necessary) the database at `path` and applies
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!(path = %path.display(), "database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with the shared connection in autocommit mode.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back
    /// on `Err`.
    pub(crate) fn with_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, E>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| E::from(anyhow::Error::new(e)))?;
        let out = f(&tx)?;
        tx.commit().map_err(|e| E::from(anyhow::Error::new(e)))?;
        Ok(out)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("database lock poisoned: {e}"))
    }
}

/// Formats a timestamp the way every table stores them: RFC 3339 UTC with
/// microsecond precision, so lexicographic order is chronological order.
pub(crate) fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("malformed stored timestamp: {s}"))?;
    Ok(parsed.with_timezone(&Utc))
}

/// True when `err` is a UNIQUE violation on the named constraint, e.g.
/// `"replies.uuid"`.
pub(crate) fn is_unique_violation(err: &rusqlite::Error, constraint: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(constraint)
        }
        _ => false,
    }
}
