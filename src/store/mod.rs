//! Directory-backed content stores.
//!
//! A store owns a data directory of full records and a parallel cache
//! directory of listing entries. [`ContentStore`] keeps an in-memory,
//! sorted list of entries and a small set of decoded full records in step
//! with the data directory; [`synchronize`](ContentStore::synchronize)
//! reconciles the two after external changes.
//!
//! The algorithm is written once against [`StoreKind`], which binds a full
//! record type to its cache entry type and file naming.

mod content;
mod diff;
mod layout;
mod loaded;
mod sort;
mod sync;

pub use content::*;
pub use diff::*;
pub use layout::*;
pub use loaded::*;
pub use sort::*;
pub use sync::{SyncCallback, SyncReport};

use crate::config::StoreConfig;
use crate::record::{CachedRecord, FullRecord, Project, ProjectCache, Scan, ScanCache};

/// Binds record types and file naming for one kind of store.
pub trait StoreKind: Send + Sync + 'static {
    type Record: FullRecord;
    type Cache: CachedRecord<Source = Self::Record>;

    /// Subdirectory under the data and cache roots.
    const DIRECTORY_NAME: &'static str;
    const FILE_EXTENSION: &'static str;
    const CACHE_EXTENSION: &'static str;

    /// Sort order configured for this kind.
    fn configured_sort(config: &StoreConfig) -> SortOrder;

    /// Layout under the given roots.
    fn layout(data_root: impl AsRef<std::path::Path>, cache_root: impl AsRef<std::path::Path>) -> StoreLayout {
        StoreLayout::new(
            data_root,
            cache_root,
            Self::DIRECTORY_NAME,
            Self::FILE_EXTENSION,
            Self::CACHE_EXTENSION,
        )
    }
}

/// Scans: `scans/<id>.cavernseerscan`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanKind;

impl StoreKind for ScanKind {
    type Record = Scan;
    type Cache = ScanCache;

    const DIRECTORY_NAME: &'static str = "scans";
    const FILE_EXTENSION: &'static str = "cavernseerscan";
    const CACHE_EXTENSION: &'static str = "cavernseerscan-cache";

    fn configured_sort(config: &StoreConfig) -> SortOrder {
        config.scan_sort
    }
}

/// Projects: `projects/<id>.cavernseerproj`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectKind;

impl StoreKind for ProjectKind {
    type Record = Project;
    type Cache = ProjectCache;

    const DIRECTORY_NAME: &'static str = "projects";
    const FILE_EXTENSION: &'static str = "cavernseerproj";
    const CACHE_EXTENSION: &'static str = "cavernseerproj-cache";

    fn configured_sort(config: &StoreConfig) -> SortOrder {
        config.project_sort
    }
}
