//! Content store synchronization against real directories.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cavernseer::archive::{read_archive, write_archive, TaggedRecord};
use cavernseer::buffer::{IndexBuffer, MeshBuffer};
use cavernseer::record::{CachedRecord, FullRecord, MeshSlice, Scan, ScanCache, Snapshot, StoredRecord};
use cavernseer::store::{ContentStore, ScanKind, SortKey, SortOrder, StoreKind, StoreOptions};
use cavernseer::util::{clock, Error, Mat4, Vec3};
use parking_lot::Mutex;
use tempfile::TempDir;

fn make_scan(name: &str, micros: i64) -> Scan {
    let mut scan = Scan::new(name, clock::from_micros(micros));
    scan.slices.push(MeshSlice {
        identifier: format!("{}-0", name),
        transform: Mat4::IDENTITY,
        vertices: MeshBuffer::from_vec3s(&[Vec3::ZERO, Vec3::X, Vec3::Z]),
        faces: IndexBuffer::from_triangles(&[[0, 1, 2]]),
    });
    scan.start_snapshot = Some(Snapshot {
        identifier: "start".into(),
        transform: Mat4::IDENTITY,
        image: name.as_bytes().to_vec(),
    });
    scan.recompute_bounds().unwrap();
    scan
}

fn open_store(dir: &TempDir) -> ContentStore<ScanKind> {
    let layout = ScanKind::layout(dir.path().join("data"), dir.path().join("cache"));
    ContentStore::open(layout, StoreOptions::default()).unwrap()
}

fn ids(store: &ContentStore<ScanKind>) -> Vec<&str> {
    store.entries().iter().map(|e| e.identifier()).collect()
}

#[test]
fn test_orphan_and_cached_scenario() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let layout = store.layout().clone();
    drop(store);

    // scan_a without cache, scan_b with matching cache
    let a = make_scan("A", 1_000);
    let b = make_scan("B", 2_000);
    write_archive(layout.record_path("scan_a"), &a.to_record(), 6).unwrap();
    write_archive(layout.record_path("scan_b"), &b.to_record(), 6).unwrap();
    let b_cache = ScanCache::derive("scan_b", &b);
    write_archive(layout.cache_path("scan_b"), &b_cache.to_record(), 0).unwrap();
    assert!(!layout.cache_path("scan_a").exists());

    let mut store = open_store(&dir);
    let report = store.synchronize().unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(store.entries().len(), 2);
    assert!(layout.cache_path("scan_a").is_file());
    assert_eq!(store.entry("scan_b").unwrap(), &b_cache);

    store.delete("scan_a").unwrap();
    assert!(!layout.record_path("scan_a").exists());
    assert!(!layout.cache_path("scan_a").exists());
    assert_eq!(ids(&store), vec!["scan_b"]);
}

#[test]
fn test_cache_self_healing_persists() {
    let dir = TempDir::new().unwrap();
    let layout = open_store(&dir).layout().clone();
    let scan = make_scan("Healed", 5_000);
    write_archive(layout.record_path("healed"), &scan.to_record(), 0).unwrap();

    let mut store = open_store(&dir);
    store.synchronize().unwrap();
    let derived = store.entry("healed").unwrap().clone();
    assert_eq!(derived, ScanCache::derive("healed", &scan));

    let on_disk = ScanCache::from_record(&read_archive(layout.cache_path("healed")).unwrap()).unwrap();
    assert_eq!(on_disk, derived);

    // a second store must load the cache file rather than derive again
    let marked = ScanCache::new("healed", "Marker", derived.timestamp);
    write_archive(layout.cache_path("healed"), &marked.to_record(), 0).unwrap();
    let mut fresh = open_store(&dir);
    fresh.synchronize().unwrap();
    assert_eq!(fresh.entry("healed").unwrap().name, "Marker");
}

#[test]
fn test_corrupt_cache_file_rebuilt_from_record() {
    let dir = TempDir::new().unwrap();
    let layout = open_store(&dir).layout().clone();
    let garbled = make_scan("Garbled", 7_000);
    let future = make_scan("Future", 8_000);
    write_archive(layout.record_path("garbled"), &garbled.to_record(), 6).unwrap();
    write_archive(layout.record_path("future"), &future.to_record(), 6).unwrap();

    // one cache file is junk, the other is from a newer schema
    fs::create_dir_all(layout.cache_dir()).unwrap();
    fs::write(layout.cache_path("garbled"), b"CVSR\x00\x01\x00\x00not a record").unwrap();
    let mut newer = ScanCache::derive("future", &future).to_record();
    newer.set("version", 99i64);
    write_archive(layout.cache_path("future"), &newer, 0).unwrap();

    let mut store = open_store(&dir);
    let report = store.synchronize().unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);

    for (id, scan) in [("garbled", &garbled), ("future", &future)] {
        let entry = store.entry(id).unwrap();
        assert!(!entry.is_error(), "{} became a placeholder", id);
        assert_eq!(entry, &ScanCache::derive(id, scan));

        let rewritten = ScanCache::from_record(&read_archive(layout.cache_path(id)).unwrap()).unwrap();
        assert_eq!(&rewritten, entry);
    }
}

#[cfg(unix)]
#[test]
fn test_non_utf8_record_name_causes_no_churn() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.save(&make_scan("plain", 1), None).unwrap();
    let odd = store.layout().data_dir().join(OsStr::from_bytes(b"odd\xff.cavernseerscan"));
    if write_archive(&odd, &make_scan("odd", 2).to_record(), 0).is_err() {
        // filesystem refuses non UTF-8 names
        return;
    }

    let mut store = open_store(&dir);
    let first = store.synchronize().unwrap();
    assert_eq!(first.inserted, 1);
    assert_eq!(ids(&store), vec!["plain"]);

    let second = store.synchronize().unwrap();
    assert_eq!((second.inserted, second.removed), (0, 0));
    assert!(odd.is_file());
}

#[test]
fn test_error_isolation() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    for (i, name) in ["one", "two", "three"].iter().enumerate() {
        store.save(&make_scan(name, i as i64), None).unwrap();
    }
    fs::write(store.layout().record_path("corrupt"), b"CVSR\x00\x01\x00\x00garbage").unwrap();

    let mut store = open_store(&dir);
    let report = store.synchronize().unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.failed, 1);

    let errors: Vec<&ScanCache> = store.entries().iter().filter(|e| e.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].identifier, "corrupt");
    assert_eq!(errors[0].timestamp, clock::far_future());
    assert!(errors[0].name.contains("corrupt"));
    assert!(errors[0].preview.is_none());
    assert!(!store.layout().cache_path("corrupt").exists());

    // direct load of the same file surfaces the error
    assert!(store.record("corrupt").is_err());
}

#[test]
fn test_future_version_isolated_in_sync_fatal_on_load() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.save(&make_scan("ok", 1), None).unwrap();
    let mut future = make_scan("future", 2).to_record();
    future.set("version", 99i64);
    write_archive(store.layout().record_path("future"), &future, 0).unwrap();

    store.synchronize().unwrap();
    assert_eq!(store.entries().len(), 2);
    assert!(store.entry("future").unwrap().is_error());
    assert!(!store.entry("ok").unwrap().is_error());

    let err = store.record("future").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::UnsupportedSchemaVersion { version: 99, .. }));
}

#[test]
fn test_mismatched_cache_identifier_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let layout = open_store(&dir).layout().clone();
    let scan = make_scan("Renamed", 10);
    write_archive(layout.record_path("renamed"), &scan.to_record(), 0).unwrap();
    let stale = ScanCache::derive("old-name", &scan);
    write_archive(layout.cache_path("renamed"), &stale.to_record(), 0).unwrap();

    let mut store = open_store(&dir);
    store.synchronize().unwrap();
    assert_eq!(ids(&store), vec!["renamed"]);
}

#[test]
fn test_external_changes_and_sort() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.save(&make_scan("b", 300), None).unwrap();
    store.save(&make_scan("a", 100), None).unwrap();
    store.save(&make_scan("c", 200), None).unwrap();
    assert_eq!(ids(&store), vec!["b", "c", "a"]);

    // another process removes one file and adds one
    fs::remove_file(store.layout().record_path("c")).unwrap();
    write_archive(store.layout().record_path("d"), &make_scan("d", 400).to_record(), 0).unwrap();
    let report = store.synchronize().unwrap();
    assert_eq!((report.inserted, report.removed, report.total), (1, 1, 3));
    assert_eq!(ids(&store), vec!["d", "b", "a"]);

    store.set_sort_order(SortOrder::new(SortKey::FileName, true));
    assert_eq!(ids(&store), vec!["a", "b", "d"]);
}

#[test]
fn test_bounded_loaded_records() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let paths: Vec<_> = ["r1", "r2", "r3"]
        .iter()
        .map(|n| store.save(&make_scan(n, 0), None).unwrap())
        .collect();

    let first = store.get_record(&paths[0]).unwrap();
    let again = store.get_record(&paths[0]).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    store.get_record(&paths[1]).unwrap();
    store.get_record(&paths[0]).unwrap();
    store.get_record(&paths[2]).unwrap();
    // FIFO: r1 was inserted first and goes first despite the recent lookup
    assert_eq!(store.loaded_paths(), vec![paths[1].clone(), paths[2].clone()]);

    let reloaded = store.get_record(&paths[0]).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(*first, *reloaded);
}

#[test]
fn test_loaded_records_dropped_when_file_disappears() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let path = store.save(&make_scan("gone", 0), None).unwrap();
    store.get_record(&path).unwrap();
    fs::remove_file(&path).unwrap();
    store.synchronize().unwrap();
    assert!(store.loaded_paths().is_empty());
    assert!(store.entries().is_empty());
    assert!(matches!(store.get_record(&path), Err(Error::NoFileAtLocation(_))));
}

#[test]
fn test_import_collision() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.import("field-trip", &make_scan("x", 0)).unwrap();
    let err = store.import("field-trip", &make_scan("y", 0)).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(ref id) if id == "field-trip"));

    // present on disk but not yet synchronized
    write_archive(store.layout().record_path("unseen"), &make_scan("z", 0).to_record(), 0).unwrap();
    assert!(matches!(store.import("unseen", &make_scan("z", 0)), Err(Error::AlreadyExists(_))));
}

#[test]
fn test_import_file() {
    let dir = TempDir::new().unwrap();
    let external = dir.path().join("Side passage.cavernseerscan");
    write_archive(&external, &make_scan("Side", 0).to_record(), 6).unwrap();

    let mut store = open_store(&dir);
    let path = store.import_file(&external).unwrap();
    assert_eq!(path, store.layout().record_path("Side passage"));
    assert_eq!(store.entry("Side passage").unwrap().name, "Side");
    assert!(matches!(store.import_file(&external), Err(Error::AlreadyExists(_))));
}

#[test]
fn test_clear_caches() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let path = store.save(&make_scan("keep", 0), None).unwrap();
    store.get_record(&path).unwrap();

    store.clear_caches().unwrap();
    assert!(store.entries().is_empty());
    assert!(store.loaded_paths().is_empty());
    assert!(store.layout().cache_dir().is_dir());
    assert_eq!(fs::read_dir(store.layout().cache_dir()).unwrap().count(), 0);
    assert!(path.is_file());

    store.synchronize().unwrap();
    assert_eq!(ids(&store), vec!["keep"]);
    assert!(store.layout().cache_path("keep").is_file());
}

#[test]
fn test_background_sync_callback_once() {
    let dir = TempDir::new().unwrap();
    let layout = open_store(&dir).layout().clone();
    for n in ["p", "q", "r"] {
        write_archive(layout.record_path(n), &make_scan(n, 0).to_record(), 0).unwrap();
    }

    let mut store = open_store(&dir);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (c, s) = (Arc::clone(&calls), Arc::clone(&seen));
    let started = store.synchronize_in_background(Some(Box::new(move |entries: &[ScanCache], err: Option<&Error>| {
        assert!(err.is_none());
        c.fetch_add(1, Ordering::SeqCst);
        s.lock().extend(entries.iter().map(|e| e.identifier.clone()));
    })));
    assert!(started);
    assert!(store.is_syncing());
    assert!(!store.synchronize_in_background(None));

    let report = loop {
        if let Some(result) = store.poll_sync() {
            break result.unwrap();
        }
        thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(report.total, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().len(), 3);
    assert_eq!(store.entries().len(), 3);
    assert!(store.poll_sync().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_upgrade_legacy_file() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let anchor = TaggedRecord::new()
        .with("identifier", "a0")
        .with("transform", Mat4::IDENTITY)
        .with("vertices", vec![0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0])
        .with("faces", [0u32, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect::<Vec<u8>>());
    let legacy = TaggedRecord::new()
        .with("timestamp", 86_400_000_000i64)
        .with("center", Vec3::ZERO)
        .with("extent", Vec3::ONE)
        .with("anchors", vec![anchor]);
    write_archive(store.layout().record_path("old"), &legacy, 0).unwrap();

    store.synchronize().unwrap();
    assert_eq!(store.entry("old").unwrap().name, "Scan 1970-01-02 00:00:00");
    assert_eq!(store.record("old").unwrap().schema_version(), 1);

    assert!(store.upgrade("old").unwrap());
    let rewritten = read_archive(store.layout().record_path("old")).unwrap();
    assert_eq!(rewritten.int("version").unwrap(), Scan::CURRENT_VERSION);
    assert!(rewritten.contains("slices"));
    assert!(!rewritten.contains("anchors"));
    assert!(!store.upgrade("old").unwrap());
    assert_eq!(store.upgrade_all().unwrap(), 0);

    let upgraded = store.record("old").unwrap();
    assert_eq!(upgraded.name, "Scan 1970-01-02 00:00:00");
    assert_eq!(upgraded.slices[0].faces.triangles().unwrap(), vec![[0, 1, 2]]);
}
