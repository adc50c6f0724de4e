//! Listing entries persisted beside full records.
//!
//! A cache entry is everything the browser needs to show a record without
//! decoding its geometry. Entries are always replaced whole; the transient
//! error payload of placeholders is never written.

use time::OffsetDateTime;

use super::{schema_version, CachedRecord, Project, Scan, StoredRecord, ERROR_NAME_PREFIX, VERSION_KEY};
use crate::archive::TaggedRecord;
use crate::util::clock;
use crate::util::{Error, Result};

/// Listing entry for a [`Scan`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScanCache {
    pub identifier: String,
    pub timestamp: OffsetDateTime,
    pub name: String,
    /// Compressed preview image (start snapshot).
    pub preview: Option<Vec<u8>>,
    error: Option<String>,
}

impl ScanCache {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp,
            name: name.into(),
            preview: None,
            error: None,
        }
    }
}

impl StoredRecord for ScanCache {
    const KIND: &'static str = "scan cache";
    const CURRENT_VERSION: i64 = 1;

    fn to_record(&self) -> TaggedRecord {
        let mut rec = header_record(Self::CURRENT_VERSION, &self.identifier, self.timestamp, &self.name);
        rec.set_opt("preview", self.preview.clone());
        rec
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        schema_version(rec, Self::KIND, Self::CURRENT_VERSION)?;
        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            timestamp: clock::from_micros(rec.int("timestamp")?),
            name: rec.str("name")?.to_string(),
            preview: rec.opt_bytes("preview")?.map(<[u8]>::to_vec),
            error: None,
        })
    }
}

impl CachedRecord for ScanCache {
    type Source = Scan;

    fn derive(identifier: &str, source: &Scan) -> Self {
        Self {
            identifier: identifier.to_string(),
            timestamp: source.timestamp,
            name: source.name.clone(),
            preview: source.start_snapshot.as_ref().map(|s| s.image.clone()),
            error: None,
        }
    }

    fn error_placeholder(identifier: &str, error: &Error) -> Self {
        Self {
            identifier: identifier.to_string(),
            timestamp: clock::far_future(),
            name: format!("{}{}", ERROR_NAME_PREFIX, identifier),
            preview: None,
            error: Some(error.to_string()),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Listing entry for a [`Project`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectCache {
    pub identifier: String,
    pub timestamp: OffsetDateTime,
    pub name: String,
    /// Preview of the first scan.
    pub preview: Option<Vec<u8>>,
    pub scan_count: usize,
    error: Option<String>,
}

impl StoredRecord for ProjectCache {
    const KIND: &'static str = "project cache";
    const CURRENT_VERSION: i64 = 1;

    fn to_record(&self) -> TaggedRecord {
        let mut rec = header_record(Self::CURRENT_VERSION, &self.identifier, self.timestamp, &self.name);
        rec.set("scanCount", self.scan_count as i64);
        rec.set_opt("preview", self.preview.clone());
        rec
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        schema_version(rec, Self::KIND, Self::CURRENT_VERSION)?;
        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            timestamp: clock::from_micros(rec.int("timestamp")?),
            name: rec.str("name")?.to_string(),
            preview: rec.opt_bytes("preview")?.map(<[u8]>::to_vec),
            scan_count: rec.usize("scanCount")?,
            error: None,
        })
    }
}

impl CachedRecord for ProjectCache {
    type Source = Project;

    fn derive(identifier: &str, source: &Project) -> Self {
        Self {
            identifier: identifier.to_string(),
            timestamp: source.timestamp,
            name: source.name.clone(),
            preview: source.preview().map(<[u8]>::to_vec),
            scan_count: source.relations().len(),
            error: None,
        }
    }

    fn error_placeholder(identifier: &str, error: &Error) -> Self {
        Self {
            identifier: identifier.to_string(),
            timestamp: clock::far_future(),
            name: format!("{}{}", ERROR_NAME_PREFIX, identifier),
            preview: None,
            scan_count: 0,
            error: Some(error.to_string()),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

fn header_record(version: i64, identifier: &str, timestamp: OffsetDateTime, name: &str) -> TaggedRecord {
    TaggedRecord::new()
        .with(VERSION_KEY, version)
        .with("identifier", identifier)
        .with("timestamp", clock::to_micros(timestamp))
        .with("name", name)
}
