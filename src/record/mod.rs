//! Versioned records.
//!
//! Each record type maps to a [`TaggedRecord`] tree carrying an integer
//! `version` field. Writers always emit the current version; readers accept
//! every version they know and fill in defaults for fields that older
//! versions did not have. A version newer than the reader is fatal.
//!
//! - [`Scan`] - full scan record (versions 1 and 2)
//! - [`Project`] - set of related scans (version 1)
//! - [`ScanCache`] / [`ProjectCache`] - lightweight listing entries

mod cache;
mod project;
mod scan;

pub use cache::*;
pub use project::*;
pub use scan::*;

#[cfg(test)]
pub(crate) use scan::tests::{legacy_record, sample_scan};

use time::OffsetDateTime;

use crate::archive::{decode_archive, encode_archive, TaggedRecord};
use crate::util::{Error, Result};

/// Name of the version tag field.
pub const VERSION_KEY: &str = "version";

/// A type persisted as a versioned tagged record.
pub trait StoredRecord: Sized + Send + Sync + 'static {
    /// Short name used in errors and logs.
    const KIND: &'static str;

    /// Version written by [`to_record`](Self::to_record).
    const CURRENT_VERSION: i64;

    /// Tagged form, always at [`CURRENT_VERSION`](Self::CURRENT_VERSION).
    fn to_record(&self) -> TaggedRecord;

    /// Restore from any supported version.
    fn from_record(rec: &TaggedRecord) -> Result<Self>;

    /// Encode as a complete archive.
    fn encode(&self, compression_level: i32) -> Result<Vec<u8>> {
        encode_archive(&self.to_record(), compression_level)
    }

    /// Decode a complete archive.
    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_record(&decode_archive(bytes)?)
    }
}

/// An authoritative record stored in a data directory.
pub trait FullRecord: StoredRecord + Clone {
    /// User-facing name; also the default file base name.
    fn display_name(&self) -> &str;

    /// Creation time.
    fn timestamp(&self) -> OffsetDateTime;

    /// Version the record was decoded from.
    fn schema_version(&self) -> i64;
}

/// Listing entry derived from a [`FullRecord`] and stored next to it.
pub trait CachedRecord: StoredRecord + Clone {
    /// Record this entry summarises.
    type Source: FullRecord;

    /// Build the entry for `source`, stored under `identifier`.
    fn derive(identifier: &str, source: &Self::Source) -> Self;

    /// In-memory stand-in for a record that could not be loaded.
    fn error_placeholder(identifier: &str, error: &Error) -> Self;

    fn identifier(&self) -> &str;

    /// Re-key an entry whose stored identifier disagrees with its file name.
    fn set_identifier(&mut self, identifier: String);

    fn display_name(&self) -> &str;

    fn timestamp(&self) -> OffsetDateTime;

    /// Load failure carried by placeholders; never persisted.
    fn error(&self) -> Option<&str>;

    #[inline]
    fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

/// Prefix marking placeholder entries in listings.
pub const ERROR_NAME_PREFIX: &str = "\u{26a0} ";

/// Read the version tag (absent = 1) and check it is within `1..=max`.
pub fn schema_version(rec: &TaggedRecord, kind: &'static str, max: i64) -> Result<i64> {
    let version = rec.opt_int(VERSION_KEY)?.unwrap_or(1);
    if !(1..=max).contains(&version) {
        return Err(Error::UnsupportedSchemaVersion { kind, version });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        let rec = TaggedRecord::new();
        assert_eq!(schema_version(&rec, "scan", 2).unwrap(), 1);

        let rec = TaggedRecord::new().with(VERSION_KEY, 2i64);
        assert_eq!(schema_version(&rec, "scan", 2).unwrap(), 2);

        let rec = TaggedRecord::new().with(VERSION_KEY, 3i64);
        let err = schema_version(&rec, "scan", 2).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchemaVersion { version: 3, .. }));
        assert!(err.is_fatal());

        let rec = TaggedRecord::new().with(VERSION_KEY, 0i64);
        assert!(schema_version(&rec, "scan", 2).is_err());
    }
}
