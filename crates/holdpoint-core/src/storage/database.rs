//! SQLite-based session history.
//!
//! Provides persistent storage for:
//! - Completed sessions, read back newest-first
//! - Key-value store for small bits of application state

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::routine::{RoutineKind, ScalingParameter};

/// One completed session. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub routine_name: String,
    pub actual_duration_min: u64,
    pub planned_duration_min: u64,
    pub scaling_parameter_used: ScalingParameter,
    /// "6 poses" / "2 grips"
    pub units_completed: String,
    pub routine_kind: RoutineKind,
}

/// Durable local home for session records.
pub trait SessionStore: Send {
    /// Append and return the row id.
    fn append(&mut self, record: &SessionRecord) -> Result<i64>;

    /// Re-read a row straight from storage.
    fn read_back(&self, id: i64) -> Result<Option<SessionRecord>>;

    /// Push anything buffered to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/holdpoint/holdpoint.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let dir = data_dir().map_err(|e| DatabaseError::DataDir(e.to_string()))?;
        Self::open_at(&dir.join("holdpoint.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp       TEXT NOT NULL,
                routine_name    TEXT NOT NULL,
                actual_min      INTEGER NOT NULL,
                planned_min     INTEGER NOT NULL,
                core_minutes    INTEGER NOT NULL,
                units_completed TEXT NOT NULL DEFAULT '',
                routine_kind    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp);",
        )?;
        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
        let timestamp: String = row.get("timestamp")?;
        let core: u8 = row.get("core_minutes")?;
        let kind: String = row.get("routine_kind")?;
        let conversion = |idx: usize, e: Box<dyn std::error::Error + Send + Sync>| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e)
        };

        Ok(SessionRecord {
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| conversion(1, Box::new(e)))?
                .with_timezone(&Utc),
            routine_name: row.get("routine_name")?,
            actual_duration_min: row.get("actual_min")?,
            planned_duration_min: row.get("planned_min")?,
            scaling_parameter_used: ScalingParameter::new(core)
                .map_err(|e| conversion(5, Box::new(e)))?,
            units_completed: row.get("units_completed")?,
            routine_kind: RoutineKind::parse(&kind)
                .ok_or_else(|| conversion(7, format!("unknown routine kind '{kind}'").into()))?,
        })
    }

    /// Record a completed session. Returns the new row id.
    pub fn record_session(&self, record: &SessionRecord) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions
                (timestamp, routine_name, actual_min, planned_min, core_minutes, units_completed, routine_kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                record.routine_name,
                record.actual_duration_min,
                record.planned_duration_min,
                record.scaling_parameter_used.get(),
                record.units_completed,
                record.routine_kind.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn session(&self, id: i64) -> Result<Option<SessionRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id],
                Self::row_to_record,
            )
            .optional()
    }

    /// Most recent sessions first. `limit = None` returns everything.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<SessionRecord>, rusqlite::Error> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT * FROM sessions ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_record)?;
        rows.collect()
    }

    pub fn session_count(&self) -> Result<u64, rusqlite::Error> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
    }

    /// Delete all history. Returns the number of rows removed.
    pub fn clear_history(&self) -> Result<usize, rusqlite::Error> {
        self.conn.execute("DELETE FROM sessions", [])
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn append(&mut self, record: &SessionRecord) -> Result<i64> {
        Ok(self.record_session(record)?)
    }

    fn read_back(&self, id: i64) -> Result<Option<SessionRecord>> {
        Ok(self.session(id)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }
}
