//! Directory synchronization: planning and the background worker.
//!
//! Planning (list, diff, load inserted entries) only reads the filesystem
//! and writes repaired cache files, so it can run on any thread. Applying a
//! plan mutates the store and happens on the owning thread.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use tracing::{debug, warn};

use super::diff::{difference, Difference};
use super::layout::StoreLayout;
use super::StoreKind;
use crate::archive::{read_archive, write_archive};
use crate::record::{CachedRecord, StoredRecord};
use crate::util::{Error, Result};

/// Callback receiving the published entries and the failure, if any.
pub type SyncCallback<C> = Box<dyn FnOnce(&[C], Option<&Error>) + Send>;

/// Counts from one applied synchronization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries added from new files.
    pub inserted: usize,
    /// Entries dropped because their files are gone.
    pub removed: usize,
    /// Inserted entries that are error placeholders.
    pub failed: usize,
    /// Entries held after the sync.
    pub total: usize,
}

/// Result of steps 1-4, ready to be applied.
pub(crate) struct SyncPlan<C> {
    /// Store generation the plan was computed against.
    pub generation: u64,
    /// Held entry locations the diff was taken from, in path order.
    pub base: Vec<PathBuf>,
    /// Fresh directory listing, in path order.
    pub listing: Vec<PathBuf>,
    pub difference: Difference,
    /// One entry per insertion offset.
    pub inserted: Vec<C>,
}

/// List the data directory, diff against `base`, and load inserted entries.
pub(crate) fn plan<K: StoreKind>(
    layout: &StoreLayout,
    generation: u64,
    base: Vec<PathBuf>,
    parallel: bool,
) -> Result<SyncPlan<K::Cache>> {
    let listing = layout.list_record_paths()?;
    let difference = difference(&base, &listing);

    let load = |&offset: &usize| load_entry::<K>(layout, &listing[offset]);
    let inserted: Vec<K::Cache> = if parallel {
        difference.insertions.par_iter().map(load).collect()
    } else {
        difference.insertions.iter().map(load).collect()
    };

    Ok(SyncPlan {
        generation,
        base,
        listing,
        difference,
        inserted,
    })
}

/// Load or derive the cache entry for the record at `path`.
///
/// Never fails: records that cannot be read become error placeholders.
pub(crate) fn load_entry<K: StoreKind>(layout: &StoreLayout, path: &Path) -> K::Cache {
    let identifier = layout
        .identifier_of(path)
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    match load_or_derive::<K>(layout, &identifier, path) {
        Ok(entry) => {
            debug!(store = K::DIRECTORY_NAME, identifier = %identifier, "entry inserted");
            entry
        }
        Err(err) => {
            warn!(store = K::DIRECTORY_NAME, identifier = %identifier, error = %err, "record unreadable");
            K::Cache::error_placeholder(&identifier, &err)
        }
    }
}

fn load_or_derive<K: StoreKind>(layout: &StoreLayout, identifier: &str, path: &Path) -> Result<K::Cache> {
    let cache_path = layout.cache_path(identifier);
    if cache_path.is_file() {
        match read_archive(&cache_path).and_then(|rec| K::Cache::from_record(&rec)) {
            Ok(mut entry) => {
                if entry.identifier() != identifier {
                    warn!(
                        store = K::DIRECTORY_NAME,
                        stored = entry.identifier(),
                        identifier,
                        "cache entry identifier differs from file name"
                    );
                    entry.set_identifier(identifier.to_string());
                }
                return Ok(entry);
            }
            Err(err) => {
                warn!(store = K::DIRECTORY_NAME, identifier, error = %err, "cache file unreadable, rebuilding");
            }
        }
    }

    let record = K::Record::from_record(&read_archive(path)?)?;
    let entry = K::Cache::derive(identifier, &record);
    match write_archive(&cache_path, &entry.to_record(), 0) {
        Ok(()) => debug!(store = K::DIRECTORY_NAME, identifier, "cache file rebuilt"),
        Err(err) => warn!(store = K::DIRECTORY_NAME, identifier, error = %err, "cannot persist cache file"),
    }
    Ok(entry)
}

/// Handle to a synchronization planned on a background thread.
pub(crate) struct SyncWorker<K: StoreKind> {
    rx: Receiver<Result<SyncPlan<K::Cache>>>,
    handle: Option<JoinHandle<()>>,
    callback: Option<SyncCallback<K::Cache>>,
    _kind: PhantomData<K>,
}

impl<K: StoreKind> SyncWorker<K> {
    /// Start planning against `base` on a new thread.
    pub fn spawn(
        layout: StoreLayout,
        generation: u64,
        base: Vec<PathBuf>,
        parallel: bool,
    ) -> Result<Self> {
        let (tx, rx) = channel();
        let handle = thread::Builder::new()
            .name(format!("cavernseer-sync-{}", K::DIRECTORY_NAME))
            .spawn(move || {
                let result = plan::<K>(&layout, generation, base, parallel);
                // receiver gone means the store was dropped
                let _ = tx.send(result);
            })?;
        Ok(Self {
            rx,
            handle: Some(handle),
            callback: None,
            _kind: PhantomData,
        })
    }

    /// Finished plan, if ready (non-blocking).
    pub fn try_recv(&mut self) -> Option<Result<SyncPlan<K::Cache>>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::other("synchronization worker terminated"))),
        }
    }

    /// Block until the plan is ready.
    pub fn recv(&mut self) -> Result<SyncPlan<K::Cache>> {
        self.rx
            .recv()
            .map_err(|_| Error::other("synchronization worker terminated"))?
    }

    /// Callback to run once the plan is applied.
    pub fn with_callback(mut self, callback: Option<SyncCallback<K::Cache>>) -> Self {
        self.callback = callback;
        self
    }

    pub fn take_callback(&mut self) -> Option<SyncCallback<K::Cache>> {
        self.callback.take()
    }
}

impl<K: StoreKind> Drop for SyncWorker<K> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
