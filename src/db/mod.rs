use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

pub mod migrations;

pub mod repositories;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const REQUIRED_TABLES: [&str; 8] = [
    "raw_events",
    "locations",
    "workers",
    "aggregates",
    "categorized_shares",
    "worker_shares",
    "missing_wages",
    "reference_rows",
];

/// What the store holds at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHealth {
    pub schema_version: i32,
    pub raw_events: i64,
    pub aggregates: i64,
    pub reference_rows: i64,
}

/// Opens SQLite connections on demand. Cheap to clone; every connection
/// is configured and brought up to the current schema.
#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
}

impl DbPool {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let path = path.into();
        info!(target: "app::db", db_path = %path.display(), "initializing database pool");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path };
        {
            pool.get_connection()?;
        }

        Ok(pool)
    }

    pub fn get_connection(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        migrations::run(&conn)?;
        debug!(target: "app::db", db_path = %self.path.display(), "database connection ready");
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.get_connection()?;
        callback(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verifies the store is readable and complete. Any failure here is a
    /// `Database` error, so callers can treat it as fatal.
    pub fn health_check(&self) -> AppResult<StoreHealth> {
        let conn = self.get_connection()?;

        let integrity: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(AppError::database(format!("integrity check failed: {integrity}")));
        }
        for table in REQUIRED_TABLES {
            let present: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )?;
            if present == 0 {
                return Err(AppError::database(format!("table {table} is missing")));
            }
        }

        let count = |table: &str| -> AppResult<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        let health = StoreHealth {
            schema_version: conn.query_row("PRAGMA user_version", [], |row| row.get(0))?,
            raw_events: count("raw_events")?,
            aggregates: count("aggregates")?,
            reference_rows: count("reference_rows")?,
        };
        debug!(
            target: "app::db",
            schema_version = health.schema_version,
            raw_events = health.raw_events,
            aggregates = health.aggregates,
            "store health checked"
        );
        Ok(health)
    }
}

fn configure_connection(conn: &mut Connection) -> AppResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", &1)?;
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    Ok(())
}
