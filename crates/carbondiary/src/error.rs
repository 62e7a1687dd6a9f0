//! Error types for carbondiary.
//!
//! This module defines all error types used throughout the carbondiary crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for carbondiary operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The key that was used for the lookup.
        key: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Account Errors ===
    /// A user with this email is already registered.
    #[error("a user with email '{email}' already exists")]
    UserExists {
        /// The email that is already taken.
        email: String,
    },

    /// The email/password combination does not match any user.
    #[error("this combination of email and password doesn't exist")]
    InvalidCredentials,

    /// An operation needed a logged-in user but the session has none.
    #[error("not logged in")]
    NotLoggedIn,

    // === Emissions Errors ===
    /// No registry car with an emissions factor matches the requested car.
    #[error("no registry car with an emissions factor matches {spec}")]
    NoMatchingCar {
        /// Display form of the car that was searched for.
        spec: String,
    },

    /// A reporting period could not be evaluated.
    #[error("invalid period: {message}")]
    InvalidPeriod {
        /// Description of the problem.
        message: String,
    },

    /// User supplied input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for carbondiary operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new invalid period error.
    #[must_use]
    pub fn invalid_period(message: impl Into<String>) -> Self {
        Self::InvalidPeriod {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error reports a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is an authentication or session issue.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::NotLoggedIn | Self::UserExists { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotLoggedIn;
        assert_eq!(err.to_string(), "not logged in");

        let err = Error::invalid_input("miles must be positive");
        assert_eq!(err.to_string(), "invalid input: miles must be positive");
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("residence", 42);
        assert_eq!(err.to_string(), "residence not found: 42");
        assert!(err.is_not_found());
        assert!(!Error::NotLoggedIn.is_not_found());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(Error::InvalidCredentials.is_auth_error());
        assert!(Error::NotLoggedIn.is_auth_error());
        assert!(Error::UserExists {
            email: "a@b.c".to_string()
        }
        .is_auth_error());
        assert!(!Error::internal("x").is_auth_error());
    }

    #[test]
    fn test_user_exists_display() {
        let err = Error::UserExists {
            email: "ada@example.com".to_string(),
        };
        assert!(err.to_string().contains("ada@example.com"));
    }

    #[test]
    fn test_no_matching_car_display() {
        let err = Error::NoMatchingCar {
            spec: "Toyota Prius 2012".to_string(),
        };
        assert!(err.to_string().contains("Toyota Prius 2012"));
    }

    #[test]
    fn test_invalid_period_display() {
        let err = Error::invalid_period("year 2999 has not started");
        assert_eq!(
            err.to_string(),
            "invalid period: year 2999 has not started"
        );
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "natural gas factor must be positive".to_string(),
        };
        assert!(err.to_string().contains("natural gas factor"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
