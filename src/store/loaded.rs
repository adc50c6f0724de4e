//! Small FIFO set of decoded full records.
//!
//! Full records can be large, so only a handful stay in memory. The oldest
//! insertion is evicted first; lookups do not refresh position.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Default number of records kept in memory.
pub const DEFAULT_LOADED_RECORDS: usize = 2;

/// Thread-safe bounded set of records keyed by file location.
pub struct LoadedRecords<R> {
    entries: Mutex<VecDeque<(PathBuf, Arc<R>)>>,
    capacity: usize,
}

impl<R> LoadedRecords<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record loaded from `path`, if resident.
    pub fn get(&self, path: &Path) -> Option<Arc<R>> {
        let entries = self.entries.lock();
        entries.iter().find(|(p, _)| p == path).map(|(_, r)| Arc::clone(r))
    }

    /// Insert as newest, returning the locations evicted to stay in bounds.
    pub fn insert(&self, path: PathBuf, record: Arc<R>) -> Vec<PathBuf> {
        let mut entries = self.entries.lock();
        entries.retain(|(p, _)| *p != path);
        entries.push_back((path, record));
        let mut evicted = Vec::new();
        while entries.len() > self.capacity {
            if let Some((p, _)) = entries.pop_front() {
                evicted.push(p);
            }
        }
        evicted
    }

    pub fn remove(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(p, _)| p != path);
        entries.len() != before
    }

    /// Keep only records whose location satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&Path) -> bool) {
        self.entries.lock().retain(|(p, _)| keep(p));
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Locations in insertion order, oldest first.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for LoadedRecords<R> {
    fn default() -> Self {
        Self::new(DEFAULT_LOADED_RECORDS)
    }
}
