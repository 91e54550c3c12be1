// restorectl/src/settings/mod.rs
pub(crate) mod transfer;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::naming::NamePatterns;

pub use transfer::{export_settings, import_settings};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Persistent client-side preferences.
pub trait SettingsStore {
    fn preferred_destination(&self) -> SettingsResult<Option<usize>>;

    fn set_preferred_destination(&mut self, value: Option<usize>) -> SettingsResult<()>;

    fn name_patterns(&self) -> SettingsResult<NamePatterns>;

    fn set_name_patterns(&mut self, patterns: &NamePatterns) -> SettingsResult<()>;

    /// Writes both keys together. Stores that can do so atomically should override this.
    fn replace_all(&mut self, destination: Option<usize>, patterns: &NamePatterns) -> SettingsResult<()> {
        self.set_preferred_destination(destination)?;
        self.set_name_patterns(patterns)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(rename = "PreferredDestination", default, skip_serializing_if = "Option::is_none")]
    preferred_destination: Option<usize>,
    #[serde(rename = "NamePatterns", default)]
    name_patterns: NamePatterns,
}

/// Settings kept as a single JSON document, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> SettingsResult<StoredSettings> {
        if !self.path.exists() {
            return Ok(StoredSettings::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(StoredSettings::default());
        }
        serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, settings: &StoredSettings) -> SettingsResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let body = serde_json::to_vec_pretty(settings).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        temp.write_all(&body).map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    fn update(&mut self, change: impl FnOnce(&mut StoredSettings)) -> SettingsResult<()> {
        let mut settings = self.load()?;
        change(&mut settings);
        self.save(&settings)
    }
}

impl SettingsStore for JsonFileStore {
    fn preferred_destination(&self) -> SettingsResult<Option<usize>> {
        Ok(self.load()?.preferred_destination)
    }

    fn set_preferred_destination(&mut self, value: Option<usize>) -> SettingsResult<()> {
        self.update(|settings| settings.preferred_destination = value)
    }

    fn name_patterns(&self) -> SettingsResult<NamePatterns> {
        Ok(self.load()?.name_patterns)
    }

    fn set_name_patterns(&mut self, patterns: &NamePatterns) -> SettingsResult<()> {
        self.update(|settings| settings.name_patterns = patterns.clone())
    }

    fn replace_all(&mut self, destination: Option<usize>, patterns: &NamePatterns) -> SettingsResult<()> {
        self.update(|settings| {
            settings.preferred_destination = destination;
            settings.name_patterns = patterns.clone();
        })
    }
}

/// Non-persistent store.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    preferred_destination: Option<usize>,
    name_patterns: NamePatterns,
}

#[cfg(test)]
impl SettingsStore for MemoryStore {
    fn preferred_destination(&self) -> SettingsResult<Option<usize>> {
        Ok(self.preferred_destination)
    }

    fn set_preferred_destination(&mut self, value: Option<usize>) -> SettingsResult<()> {
        self.preferred_destination = value;
        Ok(())
    }

    fn name_patterns(&self) -> SettingsResult<NamePatterns> {
        Ok(self.name_patterns.clone())
    }

    fn set_name_patterns(&mut self, patterns: &NamePatterns) -> SettingsResult<()> {
        self.name_patterns = patterns.clone();
        Ok(())
    }
}
