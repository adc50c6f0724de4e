//! # CavernSeer
//!
//! Persistence core for LiDAR cave scans: versioned binary records for
//! scans and projects, and directory-backed stores that keep a lightweight
//! cache entry per record for browsing without decoding geometry.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports, timestamp helpers
//! - [`buffer`] - Mesh buffer codec (vertex and index buffers)
//! - [`archive`] - Self-describing tagged binary format and file I/O
//! - [`record`] - Versioned records: scans, projects, cache entries
//! - [`store`] - Generic content store with directory synchronization
//! - [`facade`] - Scan and project stores
//! - [`config`] - Store configuration
//!
//! ## Example
//!
//! ```ignore
//! use cavernseer::prelude::*;
//!
//! let mut scans = ScanStore::from_config(&StoreConfig::default())?;
//! scans.synchronize()?;
//! for entry in scans.entries() {
//!     println!("{} {}", entry.identifier, entry.name);
//! }
//! let scan = scans.record("Main Hall")?;
//! ```

pub mod util;
pub mod buffer;
pub mod archive;
pub mod record;
pub mod store;
pub mod facade;
pub mod config;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::config::StoreConfig;
    pub use crate::facade::{ProjectStore, ScanStore};
    pub use crate::record::{
        CachedRecord, FullRecord, Project, ProjectCache, Scan, ScanCache, StoredRecord,
    };
    pub use crate::store::{ContentStore, SortKey, SortOrder, StoreKind, StoreOptions, SyncReport};
}
