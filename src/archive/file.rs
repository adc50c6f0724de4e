//! Archive file I/O.
//!
//! Reads memory-map large files; writes go through a temporary sibling that
//! is synced and renamed over the target, so a reader never observes a
//! half-written archive.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use memmap2::Mmap;
use tempfile::NamedTempFile;

use super::{decode_archive, encode_archive, TaggedRecord, HEADER_SIZE};
use crate::util::{Error, Result};

/// Files at least this large are memory-mapped instead of read.
pub const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Raw archive bytes, either mapped or owned.
pub struct RecordFile {
    inner: FileInner,
}

enum FileInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Whole file read into memory
    Owned(Vec<u8>),
}

impl RecordFile {
    /// Open a file, memory-mapping it when it is large.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| Error::from_io_at(e, path))?;
        let size = file.metadata()?.len();

        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap && size >= MMAP_THRESHOLD {
            // Safety: mapped read-only; writers replace files by rename, never in place.
            let mmap = unsafe { Mmap::map(&file) }?;
            FileInner::Mmap(mmap)
        } else {
            let mut buf = Vec::with_capacity(size as usize);
            file.read_to_end(&mut buf)?;
            FileInner::Owned(buf)
        };
        Ok(Self { inner })
    }

    /// The archive bytes.
    pub fn bytes(&self) -> &[u8] {
        match &self.inner {
            FileInner::Mmap(m) => m,
            FileInner::Owned(v) => v,
        }
    }

    /// True if the file is memory-mapped.
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, FileInner::Mmap(_))
    }

    /// Decode the archive body.
    pub fn decode(&self) -> Result<TaggedRecord> {
        decode_archive(self.bytes())
    }
}

/// Read and decode an archive file.
pub fn read_archive(path: impl AsRef<Path>) -> Result<TaggedRecord> {
    RecordFile::open(path)?.decode()
}

/// Encode `record` and atomically replace `path` with it.
pub fn write_archive(path: impl AsRef<Path>, record: &TaggedRecord, compression_level: i32) -> Result<()> {
    let bytes = encode_archive(record, compression_level)?;
    write_atomic(path, &bytes)
}

/// Write `bytes` to `path` durably: temp file, fsync, rename.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .ok_or_else(|| Error::other(format!("No parent directory for {}", path.display())))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.cavernseerscan");
        let rec = TaggedRecord::new().with("name", "entrance");

        write_archive(&path, &rec, 6).unwrap();
        let file = RecordFile::open(&path).unwrap();
        assert!(!file.is_mapped());
        assert_eq!(file.decode().unwrap(), rec);
    }

    #[test]
    fn test_large_file_is_mapped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.cavernseerscan");
        let noise: Vec<u8> = (0..MMAP_THRESHOLD as u32 + 16).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
        let rec = TaggedRecord::new().with("data", noise);

        write_archive(&path, &rec, 0).unwrap();
        let file = RecordFile::open(&path).unwrap();
        assert!(file.is_mapped());
        assert_eq!(file.decode().unwrap(), rec);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = RecordFile::open(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::NoFileAtLocation(_))));
    }

    #[test]
    fn test_overwrite_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        write_archive(&path, &TaggedRecord::new().with("n", 1i64), 0).unwrap();
        write_archive(&path, &TaggedRecord::new().with("n", 2i64), 0).unwrap();
        assert_eq!(read_archive(&path).unwrap().int("n").unwrap(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
