//! Persistent store configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::store::{SortOrder, DEFAULT_LOADED_RECORDS};
use crate::util::{Error, Result};

/// Directory name under the platform data and cache roots.
pub const APP_DIR_NAME: &str = "cavernseer";

/// Store roots and tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    // Locations
    pub data_root: PathBuf,
    pub cache_root: PathBuf,

    // Listing order
    pub scan_sort: SortOrder,
    pub project_sort: SortOrder,

    // Records decoded and kept in memory per store
    pub resident_records: usize,

    // zlib level 0-9 for full records (0 = off)
    pub compression_level: i32,

    pub parallel_sync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: Self::default_root(dirs::data_dir()),
            cache_root: Self::default_root(dirs::cache_dir()),
            scan_sort: SortOrder::default(),
            project_sort: SortOrder::default(),
            resident_records: DEFAULT_LOADED_RECORDS,
            compression_level: 6,
            parallel_sync: true,
        }
    }
}

impl StoreConfig {
    /// Config rooted at a single directory (`<root>/data`, `<root>/cache`).
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_root: root.join("data"),
            cache_root: root.join("cache"),
            ..Self::default()
        }
    }

    fn default_root(platform: Option<PathBuf>) -> PathBuf {
        platform.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR_NAME).join("config.json"))
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::from_io_at(e, path))?;
        let mut config: Self = serde_json::from_str(&text)?;
        config.validate();
        Ok(config)
    }

    /// Load, falling back to defaults if the file is absent or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(Error::NoFileAtLocation(_)) => Self::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Write as pretty JSON, creating the parent directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&mut self) {
        if !(0..=9).contains(&self.compression_level) {
            warn!(level = self.compression_level, "compression level out of range, using 6");
            self.compression_level = 6;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortKey;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = StoreConfig::rooted_at(dir.path());
        config.project_sort = SortOrder::new(SortKey::Name, true);
        config.resident_records = 4;
        config.save(&path).unwrap();

        assert_eq!(StoreConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_and_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "compression_level": 42, "parallel_sync": false }"#).unwrap();
        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.compression_level, 6);
        assert!(!config.parallel_sync);
        assert_eq!(config.resident_records, DEFAULT_LOADED_RECORDS);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(StoreConfig::load(&path), Err(Error::Json(_))));
        assert_eq!(StoreConfig::load_or_default(&path), StoreConfig::default());
        assert!(matches!(
            StoreConfig::load(dir.path().join("absent.json")),
            Err(Error::NoFileAtLocation(_))
        ));
    }
}
