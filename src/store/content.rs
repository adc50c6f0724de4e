//! The generic content store.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::layout::{sanitize_base_name, StoreLayout};
use super::loaded::{LoadedRecords, DEFAULT_LOADED_RECORDS};
use super::sort::SortOrder;
use super::sync::{self, SyncCallback, SyncPlan, SyncReport, SyncWorker};
use super::StoreKind;
use crate::archive::{read_archive, write_archive};
use crate::config::StoreConfig;
use crate::record::{CachedRecord, FullRecord, StoredRecord};
use crate::util::{Error, Result};

/// Tunables for a [`ContentStore`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoreOptions {
    pub sort: SortOrder,
    /// Capacity of the in-memory full-record set.
    pub loaded_records: usize,
    /// zlib level for full-record files, 0 = uncompressed.
    pub compression_level: i32,
    /// Load inserted entries on the rayon pool.
    pub parallel_sync: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sort: SortOrder::default(),
            loaded_records: DEFAULT_LOADED_RECORDS,
            compression_level: 6,
            parallel_sync: true,
        }
    }
}

/// How [`ContentStore::start_background`] went.
#[derive(Debug)]
pub enum SyncStart {
    /// A synchronization was already in flight.
    Busy,
    Spawned,
    /// No worker thread; synchronized in place.
    InPlace(Result<SyncReport>),
}

/// Store of one record kind rooted at a data and a cache directory.
pub struct ContentStore<K: StoreKind> {
    layout: StoreLayout,
    entries: Vec<K::Cache>,
    loaded: LoadedRecords<K::Record>,
    options: StoreOptions,
    /// Bumped on every change to `entries`; stale background plans are redone.
    generation: u64,
    pending: Option<SyncWorker<K>>,
}

impl<K: StoreKind> ContentStore<K> {
    /// Open a store, creating its directories. Entries start empty until
    /// the first synchronize.
    pub fn open(layout: StoreLayout, options: StoreOptions) -> Result<Self> {
        layout.ensure_directories()?;
        debug!(
            store = K::DIRECTORY_NAME,
            data = %layout.data_dir().display(),
            cache = %layout.cache_dir().display(),
            "store opened"
        );
        Ok(Self {
            layout,
            entries: Vec::new(),
            loaded: LoadedRecords::new(options.loaded_records),
            options,
            generation: 0,
            pending: None,
        })
    }

    /// Open with roots and tunables from `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let layout = K::layout(&config.data_root, &config.cache_root);
        Self::open(
            layout,
            StoreOptions {
                sort: K::configured_sort(config),
                loaded_records: config.resident_records,
                compression_level: config.compression_level,
                parallel_sync: config.parallel_sync,
            },
        )
    }

    #[inline]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    #[inline]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Cache entries in the active sort order.
    #[inline]
    pub fn entries(&self) -> &[K::Cache] {
        &self.entries
    }

    pub fn entry(&self, identifier: &str) -> Option<&K::Cache> {
        self.entries.iter().find(|e| e.identifier() == identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entry(identifier).is_some()
    }

    #[inline]
    pub fn sort_order(&self) -> SortOrder {
        self.options.sort
    }

    /// Change the comparator and re-sort.
    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.options.sort = order;
        order.sort(&mut self.entries);
        self.generation += 1;
    }

    /// Locations of decoded records held in memory, oldest first.
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.loaded.paths()
    }

    /// Write `record` under `base_name` (default: its display name).
    ///
    /// The full record is written before its cache entry. An existing file
    /// with the same base name is replaced.
    pub fn save(&mut self, record: &K::Record, base_name: Option<&str>) -> Result<PathBuf> {
        let identifier = sanitize_base_name(base_name.unwrap_or_else(|| record.display_name()));
        self.write(&identifier, record)
    }

    /// Save under an explicit identifier that must not exist yet.
    pub fn import(&mut self, identifier: &str, record: &K::Record) -> Result<PathBuf> {
        let identifier = sanitize_base_name(identifier);
        if self.contains(&identifier) || self.layout.record_path(&identifier).exists() {
            return Err(Error::AlreadyExists(identifier));
        }
        self.write(&identifier, record)
    }

    /// Decode an external archive and import it under its file stem.
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let identifier = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::other(format!("No file name in {}", path.display())))?;
        let record = K::Record::from_record(&read_archive(path)?)?;
        self.import(&identifier, &record)
    }

    fn write(&mut self, identifier: &str, record: &K::Record) -> Result<PathBuf> {
        let path = self.layout.record_path(identifier);
        write_archive(&path, &record.to_record(), self.options.compression_level)?;
        self.loaded.remove(&path);

        let entry = K::Cache::derive(identifier, record);
        write_archive(self.layout.cache_path(identifier), &entry.to_record(), 0)?;

        self.entries.retain(|e| e.identifier() != identifier);
        self.entries.push(entry);
        self.options.sort.sort(&mut self.entries);
        self.generation += 1;
        info!(store = K::DIRECTORY_NAME, identifier, "record saved");
        Ok(path)
    }

    /// Decoded record at `path`, from memory or disk.
    ///
    /// A miss decodes the file and inserts it into the bounded set, evicting
    /// the oldest insertions beyond capacity.
    pub fn get_record(&self, path: &Path) -> Result<Arc<K::Record>> {
        if let Some(record) = self.loaded.get(path) {
            return Ok(record);
        }
        let record = Arc::new(K::Record::from_record(&read_archive(path)?)?);
        for evicted in self.loaded.insert(path.to_path_buf(), Arc::clone(&record)) {
            debug!(store = K::DIRECTORY_NAME, path = %evicted.display(), "record evicted");
        }
        Ok(record)
    }

    /// Decoded record for `identifier`.
    pub fn record(&self, identifier: &str) -> Result<Arc<K::Record>> {
        self.get_record(&self.layout.record_path(identifier))
    }

    /// Remove a record: cache file (best effort), then data file.
    pub fn delete(&mut self, identifier: &str) -> Result<()> {
        let cache_path = self.layout.cache_path(identifier);
        if let Err(err) = fs::remove_file(&cache_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(store = K::DIRECTORY_NAME, identifier, error = %err, "cannot delete cache file");
            }
        }

        let path = self.layout.record_path(identifier);
        fs::remove_file(&path).map_err(|e| Error::from_io_at(e, &path))?;

        self.entries.retain(|e| e.identifier() != identifier);
        self.loaded.remove(&path);
        self.generation += 1;
        info!(store = K::DIRECTORY_NAME, identifier, "record deleted");
        Ok(())
    }

    /// Drop every cache file and all in-memory state.
    pub fn clear_caches(&mut self) -> Result<()> {
        match fs::remove_dir_all(self.layout.cache_dir()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.entries.clear();
        self.loaded.clear();
        self.generation += 1;
        self.layout.ensure_directories()?;
        info!(store = K::DIRECTORY_NAME, "caches cleared");
        Ok(())
    }

    /// Rewrite a legacy record at the current schema version.
    ///
    /// Returns `false` if it already is current.
    pub fn upgrade(&mut self, identifier: &str) -> Result<bool> {
        let path = self.layout.record_path(identifier);
        let record = K::Record::from_record(&read_archive(&path)?)?;
        if record.schema_version() >= K::Record::CURRENT_VERSION {
            return Ok(false);
        }
        let from = record.schema_version();
        self.write(identifier, &record)?;
        info!(
            store = K::DIRECTORY_NAME,
            identifier,
            from,
            to = K::Record::CURRENT_VERSION,
            "record upgraded"
        );
        Ok(true)
    }

    /// Upgrade every readable legacy record; returns how many were rewritten.
    pub fn upgrade_all(&mut self) -> Result<usize> {
        let mut upgraded = 0;
        for path in self.layout.list_record_paths()? {
            let Some(identifier) = self.layout.identifier_of(&path) else {
                continue;
            };
            match self.upgrade(&identifier) {
                Ok(true) => upgraded += 1,
                Ok(false) => {}
                Err(err) => warn!(store = K::DIRECTORY_NAME, identifier = %identifier, error = %err, "cannot upgrade"),
            }
        }
        Ok(upgraded)
    }

    /// Reconcile entries with the data directory.
    ///
    /// Unreadable records become error placeholders; only listing the data
    /// directory can fail.
    pub fn synchronize(&mut self) -> Result<SyncReport> {
        let plan = sync::plan::<K>(
            &self.layout,
            self.generation,
            self.held_paths(),
            self.options.parallel_sync,
        )?;
        Ok(self.apply(plan))
    }

    /// Start a synchronization on a background thread.
    ///
    /// Returns `false` if one is already in flight. The callback runs from
    /// [`poll_sync`](Self::poll_sync) or [`wait_for_sync`](Self::wait_for_sync)
    /// once entries are updated.
    pub fn synchronize_in_background(&mut self, callback: Option<SyncCallback<K::Cache>>) -> bool {
        match self.start_background() {
            SyncStart::Busy => false,
            SyncStart::Spawned => {
                self.pending = self.pending.take().map(|worker| worker.with_callback(callback));
                true
            }
            SyncStart::InPlace(result) => {
                if let Some(callback) = callback {
                    callback(&self.entries, result.as_ref().err());
                }
                true
            }
        }
    }

    /// Start a background synchronization without a callback.
    ///
    /// For wrappers that update their own state before notifying anyone.
    pub fn start_background(&mut self) -> SyncStart {
        if self.pending.is_some() {
            debug!(store = K::DIRECTORY_NAME, "synchronize already in flight");
            return SyncStart::Busy;
        }
        match SyncWorker::spawn(
            self.layout.clone(),
            self.generation,
            self.held_paths(),
            self.options.parallel_sync,
        ) {
            Ok(worker) => {
                self.pending = Some(worker);
                SyncStart::Spawned
            }
            Err(err) => {
                warn!(store = K::DIRECTORY_NAME, error = %err, "cannot start worker, synchronizing in place");
                SyncStart::InPlace(self.synchronize())
            }
        }
    }

    #[inline]
    pub fn is_syncing(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a finished background synchronization, if any (non-blocking).
    pub fn poll_sync(&mut self) -> Option<Result<SyncReport>> {
        let result = self.pending.as_mut()?.try_recv()?;
        Some(self.finish_background(result))
    }

    /// Block until the in-flight synchronization, if any, is applied.
    pub fn wait_for_sync(&mut self) -> Option<Result<SyncReport>> {
        let result = self.pending.as_mut()?.recv();
        Some(self.finish_background(result))
    }

    fn finish_background(&mut self, result: Result<SyncPlan<K::Cache>>) -> Result<SyncReport> {
        let mut worker = match self.pending.take() {
            Some(worker) => worker,
            None => return Err(Error::other("no synchronization in flight")),
        };
        let callback = worker.take_callback();
        drop(worker);

        let result = match result {
            Ok(plan) if plan.generation == self.generation => Ok(self.apply(plan)),
            Ok(_) => {
                debug!(store = K::DIRECTORY_NAME, "entries changed during background sync, recomputing");
                self.synchronize()
            }
            Err(err) => Err(err),
        };
        if let Some(callback) = callback {
            callback(&self.entries, result.as_ref().err());
        }
        result
    }

    /// Locations of non-placeholder entries in path order.
    ///
    /// Placeholders are left out so failed records are retried every sync.
    fn held_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|e| !e.is_error())
            .map(|e| self.layout.record_path(e.identifier()))
            .collect();
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        paths
    }

    fn apply(&mut self, plan: SyncPlan<K::Cache>) -> SyncReport {
        let SyncPlan {
            base,
            listing,
            difference,
            inserted,
            ..
        } = plan;

        // bring entries into the order the diff was taken in
        self.entries.retain(|e| !e.is_error());
        let layout = &self.layout;
        self.entries
            .sort_by_cached_key(|e| layout.record_path(e.identifier()).into_os_string());
        debug_assert_eq!(self.entries.len(), base.len());

        for &offset in &difference.removals {
            if let Some(entry) = self.entries.get(offset) {
                debug!(store = K::DIRECTORY_NAME, identifier = entry.identifier(), "entry removed");
            }
        }
        let report = SyncReport {
            inserted: inserted.len(),
            removed: difference.removals.len(),
            failed: inserted.iter().filter(|e| e.is_error()).count(),
            total: listing.len(),
        };
        difference.apply(&mut self.entries, inserted);

        let present: HashSet<&Path> = listing.iter().map(PathBuf::as_path).collect();
        self.loaded.retain(|path| present.contains(path));

        self.options.sort.sort(&mut self.entries);
        self.generation += 1;
        info!(
            store = K::DIRECTORY_NAME,
            inserted = report.inserted,
            removed = report.removed,
            failed = report.failed,
            total = report.total,
            "synchronized"
        );
        report
    }
}

impl<K: StoreKind> std::fmt::Debug for ContentStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("kind", &K::DIRECTORY_NAME)
            .field("layout", &self.layout)
            .field("entries", &self.entries.len())
            .field("loaded", &self.loaded.len())
            .field("syncing", &self.pending.is_some())
            .finish()
    }
}
