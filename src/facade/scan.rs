//! Scan store.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::drop_if_missing;
use crate::config::StoreConfig;
use crate::record::{CachedRecord, Scan, ScanCache};
use crate::store::{
    ContentStore, ScanKind, SortOrder, StoreKind, StoreOptions, SyncCallback, SyncReport, SyncStart,
};
use crate::util::{Error, Result};

/// Store of [`Scan`]s with a "currently visible" slot.
pub struct ScanStore {
    store: ContentStore<ScanKind>,
    visible: Option<String>,
    /// Identifier to show once the in-flight background sync lands.
    deferred_visible: Option<String>,
    /// Runs after the slot is updated, not from inside the store.
    sync_callback: Option<SyncCallback<ScanCache>>,
}

impl ScanStore {
    pub fn open(data_root: impl AsRef<Path>, cache_root: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self::from_store(ContentStore::open(ScanKind::layout(data_root, cache_root), options)?))
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::from_store(ContentStore::from_config(config)?))
    }

    pub fn from_store(store: ContentStore<ScanKind>) -> Self {
        Self {
            store,
            visible: None,
            deferred_visible: None,
            sync_callback: None,
        }
    }

    pub fn into_inner(self) -> ContentStore<ScanKind> {
        self.store
    }

    /// Identifier of the scan being shown, if any.
    pub fn visible(&self) -> Option<&str> {
        self.visible.as_deref()
    }

    /// Show `identifier`: clear the slot, optionally synchronize, then set it
    /// if the scan is still listed. Returns whether a scan is now visible.
    pub fn show(&mut self, identifier: Option<&str>, refresh: bool) -> Result<bool> {
        self.visible = None;
        if refresh {
            self.synchronize()?;
        }
        self.visible = identifier.filter(|id| self.store.contains(id)).map(str::to_string);
        Ok(self.visible.is_some())
    }

    /// Like [`show`](Self::show) with a background refresh; the slot is set
    /// when the sync is applied, before the callback runs. Returns `false`
    /// if a sync is in flight.
    pub fn show_after_sync(&mut self, identifier: &str, callback: Option<SyncCallback<ScanCache>>) -> bool {
        if self.store.is_syncing() {
            return false;
        }
        self.visible = None;
        self.deferred_visible = Some(identifier.to_string());
        self.synchronize_in_background(callback)
    }

    pub fn save(&mut self, scan: &Scan, base_name: Option<&str>) -> Result<PathBuf> {
        self.store.save(scan, base_name)
    }

    pub fn import(&mut self, identifier: &str, scan: &Scan) -> Result<PathBuf> {
        self.store.import(identifier, scan)
    }

    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.store.import_file(path)
    }

    /// Save a copy of `identifier` under `new_name`, optionally without its
    /// geographic location. The copy must not collide with an existing scan.
    pub fn copy_with_rename(&mut self, identifier: &str, new_name: &str, strip_location: bool) -> Result<PathBuf> {
        let copy = self.store.record(identifier)?.renamed(new_name, strip_location);
        self.store.import(new_name, &copy)
    }

    pub fn delete(&mut self, identifier: &str) -> Result<()> {
        self.store.delete(identifier)?;
        if self.visible.as_deref() == Some(identifier) {
            debug!(identifier, "visible scan deleted");
            self.visible = None;
        }
        Ok(())
    }

    pub fn synchronize(&mut self) -> Result<SyncReport> {
        let report = self.store.synchronize()?;
        self.after_sync();
        Ok(report)
    }

    pub fn synchronize_in_background(&mut self, callback: Option<SyncCallback<ScanCache>>) -> bool {
        match self.store.start_background() {
            SyncStart::Busy => false,
            SyncStart::Spawned => {
                self.sync_callback = callback;
                true
            }
            SyncStart::InPlace(result) => {
                self.sync_callback = callback;
                self.finish_sync(&result);
                true
            }
        }
    }

    pub fn poll_sync(&mut self) -> Option<Result<SyncReport>> {
        let result = self.store.poll_sync()?;
        self.finish_sync(&result);
        Some(result)
    }

    pub fn wait_for_sync(&mut self) -> Option<Result<SyncReport>> {
        let result = self.store.wait_for_sync()?;
        self.finish_sync(&result);
        Some(result)
    }

    pub fn clear_caches(&mut self) -> Result<()> {
        self.store.clear_caches()?;
        self.visible = None;
        Ok(())
    }

    pub fn upgrade(&mut self, identifier: &str) -> Result<bool> {
        self.store.upgrade(identifier)
    }

    pub fn upgrade_all(&mut self) -> Result<usize> {
        self.store.upgrade_all()
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.store.set_sort_order(order);
    }

    /// Placeholder entry for a scan that failed to load.
    pub fn error_entry(identifier: &str, error: &Error) -> ScanCache {
        ScanCache::error_placeholder(identifier, error)
    }

    fn finish_sync(&mut self, result: &Result<SyncReport>) {
        self.after_sync();
        if let Some(callback) = self.sync_callback.take() {
            callback(self.store.entries(), result.as_ref().err());
        }
    }

    fn after_sync(&mut self) {
        let store = &self.store;
        drop_if_missing(&mut self.visible, |id| store.contains(id));
        if let Some(id) = self.deferred_visible.take() {
            if store.contains(&id) {
                self.visible = Some(id);
            }
        }
    }
}

impl std::fmt::Debug for ScanStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanStore")
            .field("store", &self.store)
            .field("visible", &self.visible)
            .field("deferred_visible", &self.deferred_visible)
            .finish_non_exhaustive()
    }
}

impl Deref for ScanStore {
    type Target = ContentStore<ScanKind>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
