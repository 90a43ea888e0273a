// Gateway settings persistence
// Saves and loads the gateway endpoint and credential to/from a JSON file

use crate::gateway::GatewaySettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Current settings file format
const SETTINGS_VERSION: u32 = 1;

/// Error types for persistence operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// File I/O error
    #[error("IO Error: {0}")]
    Io(String),
    /// JSON serialization/deserialization error
    #[error("JSON Error: {0}")]
    Json(String),
    /// File written by an unknown format version
    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),
}

/// On-disk shape of the settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsFile {
    /// Format version (for future migration support)
    version: u32,
    url: String,
    #[serde(default)]
    token: String,
}

/// Reads and writes the saved gateway settings
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved settings; `Ok(None)` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<GatewaySettings>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json =
            fs::read_to_string(&self.path).map_err(|e| PersistenceError::Io(e.to_string()))?;
        let data: SettingsFile =
            serde_json::from_str(&json).map_err(|e| PersistenceError::Json(e.to_string()))?;

        if data.version != SETTINGS_VERSION {
            return Err(PersistenceError::UnsupportedVersion(data.version));
        }

        Ok(Some(GatewaySettings {
            url: data.url,
            token: data.token,
        }))
    }

    /// Load saved settings, falling back to `defaults` when none exist
    pub fn load_or(&self, defaults: GatewaySettings) -> Result<GatewaySettings, PersistenceError> {
        Ok(self.load()?.unwrap_or(defaults))
    }

    /// Save settings, creating the parent directory if needed
    pub fn save(&self, settings: &GatewaySettings) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::Io(e.to_string()))?;
        }

        let data = SettingsFile {
            version: SETTINGS_VERSION,
            url: settings.url.clone(),
            token: settings.token.clone(),
        };
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| PersistenceError::Json(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| PersistenceError::Io(e.to_string()))?;

        debug!(path = %self.path.display(), "Saved gateway settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("gateway.json"));

        let settings = GatewaySettings::new("wss://gw.example.net", Some("secret"));
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), Some(settings));
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"version\": 1"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("gateway.json"));

        assert_eq!(store.load().unwrap(), None);
        let defaults = GatewaySettings::new("ws://127.0.0.1:18789", None);
        assert_eq!(store.load_or(defaults.clone()).unwrap(), defaults);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.json");
        fs::write(&path, r#"{"version": 7, "url": "ws://x"}"#).unwrap();

        let err = SettingsStore::new(&path).load().unwrap_err();
        assert_eq!(err, PersistenceError::UnsupportedVersion(7));
    }

    #[test]
    fn test_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            SettingsStore::new(&path).load(),
            Err(PersistenceError::Json(_))
        ));
    }
}
