//! Session storage.
//!
//! A session is a small string key-value map. The CLI keeps it in a JSON
//! file so `user login` carries over to later invocations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Key holding the logged-in user's id.
pub const USER_ID_KEY: &str = "user_id";

/// A key-value session.
pub trait SessionStore {
    /// Get a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be saved.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a value, returning it if it was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be saved.
    fn remove(&mut self, key: &str) -> Result<Option<String>>;

    /// The logged-in user's id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoggedIn`] if no valid user id is set.
    fn user_id(&self) -> Result<i64> {
        self.get(USER_ID_KEY)
            .and_then(|value| value.parse().ok())
            .ok_or(Error::NotLoggedIn)
    }
}

/// A session that lives only as long as the value.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: BTreeMap<String, String>,
}

impl MemorySessionStore {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.values.remove(key))
    }
}

/// A session persisted as a JSON object on disk.
///
/// The file is read once when opened and rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSessionStore {
    /// Open the session file, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        debug!("Opened session at {}", path.display());
        Ok(Self { path, values })
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<Option<String>> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }
}
