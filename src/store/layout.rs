//! On-disk layout of a store.
//!
//! ```text
//! <data_root>/<directory>/<id>.<extension>          full records
//! <cache_root>/<directory>/<id>.<cache_extension>   cache entries
//! ```

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::util::{Error, Result};

/// Base name used when sanitising leaves nothing.
pub const UNTITLED_BASE_NAME: &str = "Untitled";

/// Resolves identifiers to file locations and back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreLayout {
    data_dir: PathBuf,
    cache_dir: PathBuf,
    extension: &'static str,
    cache_extension: &'static str,
}

impl StoreLayout {
    pub fn new(
        data_root: impl AsRef<Path>,
        cache_root: impl AsRef<Path>,
        directory: &str,
        extension: &'static str,
        cache_extension: &'static str,
    ) -> Self {
        Self {
            data_dir: data_root.as_ref().join(directory),
            cache_dir: cache_root.as_ref().join(directory),
            extension,
            cache_extension,
        }
    }

    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[inline]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[inline]
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    #[inline]
    pub fn cache_extension(&self) -> &'static str {
        self.cache_extension
    }

    /// Create both directories if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.cache_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                Error::other(format!("Cannot create store directory {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Full-record file for `identifier`.
    pub fn record_path(&self, identifier: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", identifier, self.extension))
    }

    /// Cache file for `identifier`.
    pub fn cache_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", identifier, self.cache_extension))
    }

    /// Identifier of a full-record path, if it carries this store's extension.
    pub fn identifier_of(&self, path: &Path) -> Option<String> {
        if path.extension()? != self.extension {
            return None;
        }
        // Non-UTF-8 names have no identifier that maps back to the same file.
        path.file_stem()?.to_str().map(str::to_owned)
    }

    /// Full-record files in the data directory, ordered by path string.
    pub fn list_record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.data_dir).map_err(|e| Error::from_io_at(e, &self.data_dir))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if self.identifier_of(&path).is_some() {
                paths.push(path);
            } else if path.extension() == Some(OsStr::new(self.extension)) {
                warn!(path = %path.display(), "skipping record with a non UTF-8 name");
            }
        }
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(paths)
    }
}

/// Make a display name safe to use as a file base name.
pub fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        UNTITLED_BASE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
