//! File-backed key/value storage.
//!
//! Values are JSON files in the platform-appropriate config directory:
//!   - Linux: `~/.config/sysnotify/`
//!   - macOS: `~/Library/Application Support/sysnotify/`
//!   - Windows: `%APPDATA%\sysnotify\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

/// A storage root. [`Storage::default`] uses the platform config directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: Option<PathBuf>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            root: dirs::config_dir().map(|dir| dir.join("sysnotify")),
        }
    }
}

impl Storage {
    /// Store files under `root` instead of the platform config directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Save a value. Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save_raw(key, &json),
            Err(_) => false,
        }
    }

    /// Load a value. Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.load_raw(key)?;
        serde_json::from_str(&json).ok()
    }

    pub fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).is_some_and(|p| p.is_file())
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(root.join(format!("{}.json", safe_key)))
    }

    fn save_raw(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        std::fs::write(path, value).is_ok()
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        let path = self.file_path(key)?;
        std::fs::read_to_string(path).ok()
    }
}
