//! Storage layer for carbondiary.
//!
//! This module provides `SQLite`-based persistent storage for accounts, the
//! emissions registry, and logged activity. Queries are split by concern:
//!
//! - [`accounts`]: users, residences and user cars
//! - [`registry`]: grid regions, zip codes, vehicles and transit types
//! - [`activity`]: trip and utility logs, and their emissions

pub mod accounts;
pub mod activity;
pub mod migrations;
pub mod registry;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use activity::{BillWithFactor, LogEntry};
pub use registry::{ImportSummary, RegistryImport};

/// Storage engine for the diary.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get row counts and file size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            users: self.count_rows("users")?,
            regions: self.count_rows("regions")?,
            zipcodes: self.count_rows("zipcodes")?,
            registry_cars: self.count_rows("cars")?,
            transit_types: self.count_rows("transit_types")?,
            trips: self.count_rows("trip_log")?,
            utility_bills: self.count_rows("utility_log")?,
            db_size_bytes,
        })
    }

    fn count_rows(&self, table: &'static str) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

/// Row counts for the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Registered users.
    pub users: i64,
    /// Grid regions.
    pub regions: i64,
    /// Zip codes mapped to regions.
    pub zipcodes: i64,
    /// Vehicle registry rows.
    pub registry_cars: i64,
    /// Transit types.
    pub transit_types: i64,
    /// Logged trips.
    pub trips: i64,
    /// Logged utility bills.
    pub utility_bills: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a date the way it is stored.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored date in column `idx`.
pub(crate) fn date_from_sql(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
