mod materials;
mod messages;
mod photos;
mod progress;
mod schema;
mod users;
mod worksites;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};

pub use schema::{DEFAULT_MATERIALS, SCHEMA};
pub use photos::is_safe_filename;
pub use users::{hash_password, verify_password};

use crate::error::Result;

/// Tunables of the progress gate and the session store.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum photos of the step's category required to complete steps 1 and 4.
    pub min_photos: u32,
    /// Lifetime of a bearer token issued at login.
    pub token_ttl: chrono::Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_photos: 2,
            token_ttl: chrono::Duration::hours(24),
        }
    }
}

/// Shared handle to the SQLite database.
///
/// Cloning is cheap; all clones serialize on the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: GateConfig,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Opens `obra.db` in the platform data directory, creating it if needed.
    pub fn open_default() -> anyhow::Result<Self> {
        let dirs = directories::ProjectDirs::from("com", "construccionpro", "obra")
            .ok_or_else(|| anyhow::anyhow!("could not determine a data directory"))?;
        std::fs::create_dir_all(dirs.data_dir())?;
        let path = dirs.data_dir().join("obra.db");
        tracing::debug!("Opening database at {}", path.display());
        Ok(Self::open(path)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config: GateConfig::default(),
        })
    }

    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Creates tables and seeds the material catalog. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO materiales (nombre, unidad, precio_unitario, stock_disponible)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (nombre, unidad, precio, stock) in DEFAULT_MATERIALS {
            stmt.execute(params![nombre, unidad, precio, stock])?;
        }
        tracing::debug!("Database schema up to date");
        Ok(())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite itself inconsistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Maps a stored enum string back to its type, failing the row on unknown values.
pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value {raw:?}").into(),
        )
    })
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
