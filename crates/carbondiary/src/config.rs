//! Configuration management for carbondiary.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::emissions::DEFAULT_NATURAL_GAS_LB_PER_THERM;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "carbondiary";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "diary.db";

/// Default session file name.
const SESSION_FILE_NAME: &str = "session.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CARBONDIARY_`)
/// 2. TOML config file at `~/.config/carbondiary/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Emissions factor configuration.
    pub emissions: EmissionsConfig,
    /// Session configuration.
    pub session: SessionConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/carbondiary/diary.db`
    pub database_path: Option<PathBuf>,
}

/// Emissions factors that are not stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionsConfig {
    /// Pounds of CO2 released per therm of natural gas burned.
    pub natural_gas_lb_per_therm: f64,
}

/// Session-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the session file.
    /// Defaults to `~/.local/share/carbondiary/session.json`
    pub session_path: Option<PathBuf>,
}

impl Default for EmissionsConfig {
    fn default() -> Self {
        Self {
            natural_gas_lb_per_therm: DEFAULT_NATURAL_GAS_LB_PER_THERM,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CARBONDIARY_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let factor = self.emissions.natural_gas_lb_per_therm;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("natural_gas_lb_per_therm must be positive, got {factor}"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.session
            .session_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(config.session.session_path.is_none());
        assert!((config.emissions.natural_gas_lb_per_therm - 11.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_gas_factor() {
        let mut config = Config::default();
        config.emissions.natural_gas_lb_per_therm = 0.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("natural_gas_lb_per_therm"));
    }

    #[test]
    fn test_validate_rejects_nan_gas_factor() {
        let mut config = Config::default();
        config.emissions.natural_gas_lb_per_therm = f64::NAN;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("diary.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_session_path_default() {
        let path = Config::default().session_path();
        assert!(path.to_string_lossy().contains("session.json"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("carbondiary"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "carbondiary_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[emissions]\nnatural_gas_lb_per_therm = 12.5\n\n[storage]\ndatabase_path = \"/tmp/x.db\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert!((config.emissions.natural_gas_lb_per_therm - 12.5).abs() < f64::EPSILON);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/x.db"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_reads_every_section_table() {
        let path = std::env::temp_dir().join(format!(
            "carbondiary_config_sections_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[storage]\ndatabase_path = \"/tmp/diary.db\"\n\n\
             [emissions]\nnatural_gas_lb_per_therm = 11.0\n\n\
             [session]\nsession_path = \"/tmp/session.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/diary.db"));
        assert!((config.emissions.natural_gas_lb_per_therm - 11.0).abs() < f64::EPSILON);
        assert_eq!(config.session_path(), PathBuf::from("/tmp/session.json"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let path = std::env::temp_dir().join(format!(
            "carbondiary_config_invalid_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[emissions]\nnatural_gas_lb_per_therm = -1.0\n").unwrap();

        let result = Config::load_from(Some(path.clone()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_emissions_config_deserialize() {
        let json = r#"{"natural_gas_lb_per_therm": 11.0}"#;
        let emissions: EmissionsConfig = serde_json::from_str(json).unwrap();
        assert!((emissions.natural_gas_lb_per_therm - 11.0).abs() < f64::EPSILON);
    }
}
