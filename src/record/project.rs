//! Project records: scans placed relative to each other.

use time::OffsetDateTime;

use super::{schema_version, FullRecord, Scan, StoredRecord, VERSION_KEY};
use crate::archive::TaggedRecord;
use crate::util::clock;
use crate::util::{Error, Mat4, Result};

/// Prefix of names synthesised for projects without a stored name.
pub const DEFAULT_PROJECT_NAME_PREFIX: &str = "Project";

/// A scan and its placement relative to another relation in the same project.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanRelation {
    pub scan: Scan,
    /// Transform from this scan into the neighbor's frame.
    pub transform: Mat4,
    /// Position of the neighbor relation in [`Project::relations`].
    pub neighbor: Option<usize>,
}

/// An ordered set of related scans.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    version: i64,
    pub timestamp: OffsetDateTime,
    pub name: String,
    relations: Vec<ScanRelation>,
}

impl Project {
    /// Empty project at the current version.
    pub fn new(name: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            timestamp,
            name: name.into(),
            relations: Vec::new(),
        }
    }

    /// Relations in stored order.
    pub fn relations(&self) -> &[ScanRelation] {
        &self.relations
    }

    /// Append a scan. `neighbor` must refer to an existing relation.
    pub fn add_scan(&mut self, scan: Scan, transform: Mat4, neighbor: Option<usize>) -> Result<usize> {
        if let Some(n) = neighbor {
            if n >= self.relations.len() {
                return Err(Error::invalid(format!(
                    "neighbor {} out of range ({} relations)",
                    n,
                    self.relations.len()
                )));
            }
        }
        self.relations.push(ScanRelation { scan, transform, neighbor });
        Ok(self.relations.len() - 1)
    }

    /// Resolve the back-reference of relation `index`.
    pub fn neighbor(&self, index: usize) -> Option<&ScanRelation> {
        let n = self.relations.get(index)?.neighbor?;
        self.relations.get(n)
    }

    /// Transform of relation `index` into the project frame, composing the
    /// chain of neighbors. Cycles are reported as errors.
    pub fn world_transform(&self, index: usize) -> Result<Mat4> {
        let mut current = index;
        let mut world = Mat4::IDENTITY;
        for _ in 0..=self.relations.len() {
            let relation = self
                .relations
                .get(current)
                .ok_or_else(|| Error::invalid(format!("relation {} out of range", current)))?;
            world = relation.transform * world;
            match relation.neighbor {
                Some(next) => current = next,
                None => return Ok(world),
            }
        }
        Err(Error::invalid(format!("neighbor cycle through relation {}", index)))
    }

    /// Preview image of the first scan, if any.
    pub fn preview(&self) -> Option<&[u8]> {
        self.relations
            .first()
            .and_then(|r| r.scan.start_snapshot.as_ref())
            .map(|s| s.image.as_slice())
    }
}

impl StoredRecord for Project {
    const KIND: &'static str = "project";
    const CURRENT_VERSION: i64 = 1;

    fn to_record(&self) -> TaggedRecord {
        let relations: Vec<TaggedRecord> = self
            .relations
            .iter()
            .map(|r| {
                TaggedRecord::new()
                    .with("scan", r.scan.to_record())
                    .with("transform", r.transform)
                    .with("neighbor", r.neighbor.map_or(-1, |n| n as i64))
            })
            .collect();

        TaggedRecord::new()
            .with(VERSION_KEY, Self::CURRENT_VERSION)
            .with("timestamp", clock::to_micros(self.timestamp))
            .with("name", self.name.as_str())
            .with("relations", relations)
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        let version = schema_version(rec, Self::KIND, Self::CURRENT_VERSION)?;
        let timestamp = clock::from_micros(rec.int("timestamp")?);
        let name = match rec.opt_str("name")? {
            Some(name) => name.to_string(),
            None => clock::default_name(DEFAULT_PROJECT_NAME_PREFIX, timestamp),
        };

        let items = rec.list_or_empty("relations")?;
        let mut relations = Vec::with_capacity(items.len());
        for item in items {
            let neighbor = match item.int("neighbor")? {
                -1 => None,
                n if n >= 0 && (n as usize) < items.len() => Some(n as usize),
                n => {
                    return Err(Error::invalid(format!(
                        "neighbor {} out of range ({} relations)",
                        n,
                        items.len()
                    )))
                }
            };
            relations.push(ScanRelation {
                scan: Scan::from_record(item.record("scan")?)?,
                transform: item.mat4("transform")?,
                neighbor,
            });
        }

        Ok(Self { version, timestamp, name, relations })
    }
}

impl FullRecord for Project {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    fn schema_version(&self) -> i64 {
        self.version
    }
}
