//! Project store.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::drop_if_missing;
use crate::config::StoreConfig;
use crate::record::{CachedRecord, Project, ProjectCache};
use crate::store::{
    ContentStore, ProjectKind, SortOrder, StoreKind, StoreOptions, SyncCallback, SyncReport, SyncStart,
};
use crate::util::{Error, Result};

/// Store of [`Project`]s with a "currently selected" slot.
pub struct ProjectStore {
    store: ContentStore<ProjectKind>,
    selected: Option<String>,
    sync_callback: Option<SyncCallback<ProjectCache>>,
}

impl ProjectStore {
    pub fn open(data_root: impl AsRef<Path>, cache_root: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self::from_store(ContentStore::open(ProjectKind::layout(data_root, cache_root), options)?))
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::from_store(ContentStore::from_config(config)?))
    }

    pub fn from_store(store: ContentStore<ProjectKind>) -> Self {
        Self {
            store,
            selected: None,
            sync_callback: None,
        }
    }

    pub fn into_inner(self) -> ContentStore<ProjectKind> {
        self.store
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a listed project, or clear the selection with `None`.
    pub fn select(&mut self, identifier: Option<&str>) -> Result<()> {
        match identifier {
            Some(id) if !self.store.contains(id) => Err(Error::NoFileAtLocation(self.store.layout().record_path(id))),
            _ => {
                self.selected = identifier.map(str::to_string);
                Ok(())
            }
        }
    }

    /// Decoded record of the selected project.
    pub fn selected_project(&self) -> Result<Option<Arc<Project>>> {
        self.selected.as_deref().map(|id| self.store.record(id)).transpose()
    }

    pub fn save(&mut self, project: &Project, base_name: Option<&str>) -> Result<PathBuf> {
        self.store.save(project, base_name)
    }

    pub fn import(&mut self, identifier: &str, project: &Project) -> Result<PathBuf> {
        self.store.import(identifier, project)
    }

    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.store.import_file(path)
    }

    pub fn delete(&mut self, identifier: &str) -> Result<()> {
        self.store.delete(identifier)?;
        if self.selected.as_deref() == Some(identifier) {
            debug!(identifier, "selected project deleted");
            self.selected = None;
        }
        Ok(())
    }

    pub fn synchronize(&mut self) -> Result<SyncReport> {
        let report = self.store.synchronize()?;
        self.after_sync();
        Ok(report)
    }

    /// The callback runs after the selection has been checked against the
    /// new entries.
    pub fn synchronize_in_background(&mut self, callback: Option<SyncCallback<ProjectCache>>) -> bool {
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
        self.selected = None;
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

    /// Placeholder entry for a project that failed to load.
    pub fn error_entry(identifier: &str, error: &Error) -> ProjectCache {
        ProjectCache::error_placeholder(identifier, error)
    }

    fn finish_sync(&mut self, result: &Result<SyncReport>) {
        self.after_sync();
        if let Some(callback) = self.sync_callback.take() {
            callback(self.store.entries(), result.as_ref().err());
        }
    }

    fn after_sync(&mut self) {
        let store = &self.store;
        drop_if_missing(&mut self.selected, |id| store.contains(id));
    }
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore")
            .field("store", &self.store)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Deref for ProjectStore {
    type Target = ContentStore<ProjectKind>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
