//! Database migration system for carbondiary.
//!
//! The base schema is created idempotently; numbered migrations then bring
//! databases created by older releases up to [`CURRENT_VERSION`].

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_CARS_UNIQUE_INDEX, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 3;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Run migrations from the given version to the current version.
fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
        info!("Migrated database schema to version {}", current);
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Run a specific migration version.
fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        3 => migrate_v3(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Migration to version 1 (initial schema, already created).
fn migrate_v1(conn: &Connection) -> Result<()> {
    set_schema_version(conn, 1)
}

/// Migration to version 2: residences record how many people live there.
fn migrate_v2(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "residences", "residents")? {
        conn.execute("ALTER TABLE residences ADD COLUMN residents INTEGER", [])?;
    }
    set_schema_version(conn, 2)
}

/// Migration to version 3: registry cars are unique per variant.
fn migrate_v3(conn: &Connection) -> Result<()> {
    let removed = conn.execute(
        r"
        DELETE FROM cars WHERE id NOT IN (
            SELECT MAX(id) FROM cars
            GROUP BY make, model, year, IFNULL(cylinders, -1), IFNULL(transmission, '')
        )
        ",
        [],
    )?;
    if removed > 0 {
        info!("Removed {} duplicate registry cars", removed);
    }
    conn.execute(CREATE_CARS_UNIQUE_INDEX, [])?;
    set_schema_version(conn, 3)
}

/// Check whether `table` has a column named `column`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    fn table_count(conn: &Connection, name: &str) -> i32 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        for table in [
            "users",
            "regions",
            "zipcodes",
            "cars",
            "transit_types",
            "user_cars",
            "residences",
            "trip_log",
            "utility_log",
            "metadata",
        ] {
            assert_eq!(table_count(&conn, table), 1, "missing table {table}");
        }
    }

    #[test]
    fn test_initialize_schema_sets_version() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();

        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_schema_version_fresh_db() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_invalid_schema_version() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES ('schema_version', 'abc')",
            [],
        )
        .unwrap();

        let err = get_schema_version(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version"));
    }

    #[test]
    fn test_migrate_v2_adds_residents_column() {
        let conn = create_test_db();
        conn.execute_batch(
            r"
            CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
            CREATE TABLE residences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                zipcode TEXT NOT NULL,
                address TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .unwrap();
        assert!(!column_exists(&conn, "residences", "residents").unwrap());

        initialize_schema(&conn).unwrap();

        assert!(column_exists(&conn, "residences", "residents").unwrap());
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_migrate_v3_removes_duplicate_cars() {
        let conn = create_test_db();
        conn.execute_batch(
            r"
            CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO metadata (key, value) VALUES ('schema_version', '2');
            CREATE TABLE cars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                make TEXT NOT NULL,
                model TEXT NOT NULL,
                year INTEGER NOT NULL,
                cylinders INTEGER,
                transmission TEXT,
                fuel_type TEXT,
                grams_co2_per_mile REAL,
                mpg_city REAL,
                mpg_highway REAL,
                mpg_combined REAL
            );
            INSERT INTO cars (make, model, year, grams_co2_per_mile) VALUES ('Toyota', 'Prius', 2012, 180.0);
            INSERT INTO cars (make, model, year, grams_co2_per_mile) VALUES ('Toyota', 'Prius', 2012, 178.0);
            INSERT INTO cars (make, model, year, cylinders, grams_co2_per_mile) VALUES ('Toyota', 'Prius', 2012, 4, 175.0);
            ",
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let rows: Vec<f64> = conn
            .prepare("SELECT grams_co2_per_mile FROM cars ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(rows, vec![178.0, 175.0]);

        let duplicate = conn.execute(
            "INSERT INTO cars (make, model, year, grams_co2_per_mile) VALUES ('Toyota', 'Prius', 2012, 1.0)",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_run_migration_unknown_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let err = run_migration(&conn, 999).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }

    #[test]
    fn test_indexes_created() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.iter().any(|n| n == "idx_cars_match"));
        assert!(indexes.iter().any(|n| n == "idx_cars_unique"));
        assert!(indexes.iter().any(|n| n == "idx_trip_log_user_date"));
        assert!(indexes.iter().any(|n| n == "idx_utility_log_period"));
    }
}
