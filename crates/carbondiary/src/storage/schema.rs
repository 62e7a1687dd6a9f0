//! `SQLite` schema definitions for carbondiary.
//!
//! Dates are stored as `YYYY-MM-DD` text so range predicates compare
//! lexicographically.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    name TEXT NOT NULL,
    username TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the grid regions table.
pub const CREATE_REGIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS regions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    lb_co2e_per_mwh REAL NOT NULL
)
";

/// SQL statement to create the zip code table.
pub const CREATE_ZIPCODES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS zipcodes (
    zipcode TEXT PRIMARY KEY,
    region_id INTEGER NOT NULL REFERENCES regions(id),
    city TEXT,
    state TEXT
)
";

/// SQL statement to create the vehicle registry table.
pub const CREATE_CARS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cars (
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
)
";

/// SQL statement to create the transit types table.
pub const CREATE_TRANSIT_TYPES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS transit_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    grams_co2_per_mile REAL NOT NULL
)
";

/// SQL statement to create the user cars table.
pub const CREATE_USER_CARS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS user_cars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    make TEXT NOT NULL,
    model TEXT NOT NULL,
    year INTEGER NOT NULL,
    cylinders INTEGER,
    transmission TEXT,
    grams_co2_per_mile REAL NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create the residences table.
pub const CREATE_RESIDENCES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS residences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    zipcode TEXT NOT NULL REFERENCES zipcodes(zipcode),
    address TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    residents INTEGER,
    UNIQUE (user_id, address)
)
";

/// SQL statement to create the trip log table.
///
/// Exactly one of `user_car_id` and `transit_type_id` is set.
pub const CREATE_TRIP_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS trip_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    user_car_id INTEGER REFERENCES user_cars(id),
    transit_type_id INTEGER REFERENCES transit_types(id),
    date TEXT NOT NULL,
    miles REAL NOT NULL,
    passengers INTEGER NOT NULL DEFAULT 1,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK ((user_car_id IS NULL) <> (transit_type_id IS NULL))
)
";

/// SQL statement to create the utility bill log table.
pub const CREATE_UTILITY_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS utility_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    residence_id INTEGER NOT NULL REFERENCES residences(id),
    kind TEXT NOT NULL,
    amount REAL NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index for registry car matching.
pub const CREATE_CARS_MATCH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_cars_match ON cars(make, model, year)
";

/// SQL statement to create the unique key of registry cars.
///
/// Created by migration rather than [`SCHEMA_STATEMENTS`] since older
/// databases may hold duplicate rows that have to be removed first.
pub const CREATE_CARS_UNIQUE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_cars_unique
ON cars(make, model, year, IFNULL(cylinders, -1), IFNULL(transmission, ''))
";

/// SQL statement to create an index for place name lookups.
pub const CREATE_ZIPCODES_PLACE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_zipcodes_place ON zipcodes(city, state)
";

/// SQL statement to create an index on trips by user and date.
pub const CREATE_TRIP_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trip_log_user_date ON trip_log(user_id, date)
";

/// SQL statement to create an index on `content_hash` for trip deduplication.
pub const CREATE_TRIP_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trip_log_hash ON trip_log(content_hash)
";

/// SQL statement to create an index on bills by residence and period.
pub const CREATE_UTILITY_PERIOD_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_utility_log_period ON utility_log(residence_id, start_date, end_date)
";

/// SQL statement to create an index on `content_hash` for bill deduplication.
pub const CREATE_UTILITY_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_utility_log_hash ON utility_log(content_hash)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_REGIONS_TABLE,
    CREATE_ZIPCODES_TABLE,
    CREATE_CARS_TABLE,
    CREATE_TRANSIT_TYPES_TABLE,
    CREATE_USER_CARS_TABLE,
    CREATE_RESIDENCES_TABLE,
    CREATE_TRIP_LOG_TABLE,
    CREATE_UTILITY_LOG_TABLE,
    CREATE_CARS_MATCH_INDEX,
    CREATE_ZIPCODES_PLACE_INDEX,
    CREATE_TRIP_DATE_INDEX,
    CREATE_TRIP_HASH_INDEX,
    CREATE_UTILITY_PERIOD_INDEX,
    CREATE_UTILITY_HASH_INDEX,
    CREATE_METADATA_TABLE,
];
