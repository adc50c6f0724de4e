//! Scan records.
//!
//! Version history:
//! - 1: geometry as `anchors`, packed xyz floats and raw u32 triangles; no
//!   name, no survey data.
//! - 2: geometry as `slices` of self-describing [`MeshBuffer`] /
//!   [`IndexBuffer`] records; adds `name`, `stations`, `lines`, `location`.

use time::OffsetDateTime;

use super::{schema_version, FullRecord, StoredRecord, VERSION_KEY};
use crate::archive::TaggedRecord;
use crate::buffer::{IndexBuffer, MeshBuffer};
use crate::util::clock;
use crate::util::{Bounds, Error, Mat4, Result, Vec3};

/// Prefix of names synthesised for records that predate stored names.
pub const DEFAULT_SCAN_NAME_PREFIX: &str = "Scan";

/// One captured mesh anchor: geometry in its own local frame.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshSlice {
    pub identifier: String,
    pub transform: Mat4,
    pub vertices: MeshBuffer,
    pub faces: IndexBuffer,
}

impl MeshSlice {
    fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("identifier", self.identifier.as_str())
            .with("transform", self.transform)
            .with("vertices", self.vertices.to_record())
            .with("faces", self.faces.to_record())
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            transform: rec.mat4("transform")?,
            vertices: MeshBuffer::from_record(rec.record("vertices")?)?,
            faces: IndexBuffer::from_record(rec.record("faces")?)?,
        })
    }

    /// Version 1 anchors stored bare float/index arrays.
    fn from_legacy_anchor(rec: &TaggedRecord) -> Result<Self> {
        let floats = rec.floats("vertices")?;
        if floats.len() % 3 != 0 {
            return Err(Error::corrupt(format!("{} legacy vertex floats", floats.len())));
        }
        let points: Vec<Vec3> = floats.chunks_exact(3).map(Vec3::from_slice).collect();

        let faces = rec.bytes("faces")?;
        if faces.len() % 12 != 0 {
            return Err(Error::corrupt(format!("{} legacy face bytes", faces.len())));
        }

        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            transform: rec.mat4("transform")?,
            vertices: MeshBuffer::from_vec3s(&points),
            faces: IndexBuffer::new(faces.to_vec(), 4, faces.len() / 12, 3)?,
        })
    }
}

/// Camera frame captured at the start or end of a scan.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub identifier: String,
    pub transform: Mat4,
    /// Encoded image bytes (JPEG as produced by the device).
    pub image: Vec<u8>,
}

impl Snapshot {
    fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("identifier", self.identifier.as_str())
            .with("transform", self.transform)
            .with("image", self.image.clone())
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            transform: rec.mat4("transform")?,
            image: rec.bytes("image")?.to_vec(),
        })
    }
}

/// Named survey point.
#[derive(Clone, Debug, PartialEq)]
pub struct SurveyStation {
    pub identifier: String,
    pub name: String,
    pub position: Vec3,
}

impl SurveyStation {
    fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("identifier", self.identifier.as_str())
            .with("name", self.name.as_str())
            .with("position", self.position)
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Ok(Self {
            identifier: rec.str("identifier")?.to_string(),
            name: rec.str("name")?.to_string(),
            position: rec.vec3("position")?,
        })
    }
}

/// Survey shot between two stations, referenced by station identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurveyLine {
    pub start: String,
    pub end: String,
}

impl SurveyLine {
    fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("start", self.start.as_str())
            .with("end", self.end.as_str())
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Ok(Self {
            start: rec.str("start")?.to_string(),
            end: rec.str("end")?.to_string(),
        })
    }
}

/// Where the scan was taken.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoLocation {
    fn to_record(self) -> TaggedRecord {
        TaggedRecord::new()
            .with("latitude", self.latitude)
            .with("longitude", self.longitude)
            .with("altitude", self.altitude)
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Ok(Self {
            latitude: rec.double("latitude")?,
            longitude: rec.double("longitude")?,
            altitude: rec.double("altitude")?,
        })
    }
}

/// A complete scan.
#[derive(Clone, Debug, PartialEq)]
pub struct Scan {
    version: i64,
    pub timestamp: OffsetDateTime,
    pub name: String,
    pub center: Vec3,
    pub extent: Vec3,
    pub slices: Vec<MeshSlice>,
    pub start_snapshot: Option<Snapshot>,
    pub end_snapshot: Option<Snapshot>,
    pub stations: Vec<SurveyStation>,
    pub lines: Vec<SurveyLine>,
    pub location: Option<GeoLocation>,
}

impl Scan {
    /// Empty scan at the current version.
    pub fn new(name: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            timestamp,
            name: name.into(),
            center: Vec3::ZERO,
            extent: Vec3::ZERO,
            slices: Vec::new(),
            start_snapshot: None,
            end_snapshot: None,
            stations: Vec::new(),
            lines: Vec::new(),
            location: None,
        }
    }

    /// Recompute `center` and `extent` from all slice vertices in scan space.
    pub fn recompute_bounds(&mut self) -> Result<()> {
        let mut bounds = Bounds::EMPTY;
        for slice in &self.slices {
            for p in slice.vertices.vec3s()? {
                bounds.expand_by_point(slice.transform.transform_point3(p));
            }
        }
        self.center = bounds.center();
        self.extent = bounds.extent();
        Ok(())
    }

    /// Total vertex count across slices.
    pub fn vertex_count(&self) -> usize {
        self.slices.iter().map(|s| s.vertices.count()).sum()
    }

    /// Total face count across slices.
    pub fn face_count(&self) -> usize {
        self.slices.iter().map(|s| s.faces.count()).sum()
    }

    /// Station by identifier.
    pub fn station(&self, identifier: &str) -> Option<&SurveyStation> {
        self.stations.iter().find(|s| s.identifier == identifier)
    }

    /// Both ends of a line, if both stations exist.
    pub fn line_stations(&self, line: &SurveyLine) -> Option<(&SurveyStation, &SurveyStation)> {
        Some((self.station(&line.start)?, self.station(&line.end)?))
    }

    /// Copy under a new display name, optionally dropping the location.
    pub fn renamed(&self, name: impl Into<String>, strip_location: bool) -> Self {
        let mut copy = self.clone();
        copy.name = name.into();
        if strip_location {
            copy.location = None;
        }
        copy
    }

    fn read_geometry(rec: &TaggedRecord, version: i64) -> Result<Vec<MeshSlice>> {
        match version {
            1 => rec
                .list_or_empty("anchors")?
                .iter()
                .map(MeshSlice::from_legacy_anchor)
                .collect(),
            _ => rec
                .list_or_empty("slices")?
                .iter()
                .map(MeshSlice::from_record)
                .collect(),
        }
    }
}

impl StoredRecord for Scan {
    const KIND: &'static str = "scan";
    const CURRENT_VERSION: i64 = 2;

    fn to_record(&self) -> TaggedRecord {
        let mut rec = TaggedRecord::new()
            .with(VERSION_KEY, Self::CURRENT_VERSION)
            .with("timestamp", clock::to_micros(self.timestamp))
            .with("name", self.name.as_str())
            .with("center", self.center)
            .with("extent", self.extent)
            .with("slices", self.slices.iter().map(MeshSlice::to_record).collect::<Vec<_>>())
            .with("stations", self.stations.iter().map(SurveyStation::to_record).collect::<Vec<_>>())
            .with("lines", self.lines.iter().map(SurveyLine::to_record).collect::<Vec<_>>());
        rec.set_opt("startSnapshot", self.start_snapshot.as_ref().map(Snapshot::to_record));
        rec.set_opt("endSnapshot", self.end_snapshot.as_ref().map(Snapshot::to_record));
        rec.set_opt("location", self.location.map(GeoLocation::to_record));
        rec
    }

    fn from_record(rec: &TaggedRecord) -> Result<Self> {
        let version = schema_version(rec, Self::KIND, Self::CURRENT_VERSION)?;
        let timestamp = clock::from_micros(rec.int("timestamp")?);

        let name = match rec.opt_str("name")? {
            Some(name) => name.to_string(),
            None => clock::default_name(DEFAULT_SCAN_NAME_PREFIX, timestamp),
        };

        let snapshot = |key: &str| -> Result<Option<Snapshot>> {
            rec.opt_record(key)?.map(Snapshot::from_record).transpose()
        };

        Ok(Self {
            version,
            timestamp,
            name,
            center: rec.vec3("center")?,
            extent: rec.vec3("extent")?,
            slices: Self::read_geometry(rec, version)?,
            start_snapshot: snapshot("startSnapshot")?,
            end_snapshot: snapshot("endSnapshot")?,
            stations: rec
                .list_or_empty("stations")?
                .iter()
                .map(SurveyStation::from_record)
                .collect::<Result<_>>()?,
            lines: rec
                .list_or_empty("lines")?
                .iter()
                .map(SurveyLine::from_record)
                .collect::<Result<_>>()?,
            location: rec.opt_record("location")?.map(GeoLocation::from_record).transpose()?,
        })
    }
}

impl FullRecord for Scan {
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::Quat;

    pub(crate) fn sample_scan(name: &str) -> Scan {
        let mut scan = Scan::new(name, clock::from_micros(1_700_000_000_000_000));
        scan.slices.push(MeshSlice {
            identifier: "anchor-0".into(),
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)),
            vertices: MeshBuffer::from_vec3s(&[Vec3::ZERO, Vec3::X, Vec3::Y]),
            faces: IndexBuffer::from_triangles(&[[0, 1, 2]]),
        });
        scan.start_snapshot = Some(Snapshot {
            identifier: "start".into(),
            transform: Mat4::from_quat(Quat::from_rotation_y(0.5)),
            image: vec![0xff, 0xd8, 0xff, 0xe0],
        });
        scan.end_snapshot = Some(Snapshot {
            identifier: "end".into(),
            transform: Mat4::from_translation(Vec3::new(1.0, 0.0, -1.0)),
            image: vec![0x89, 0x50, 0x4e, 0x47],
        });
        scan.stations = vec![
            SurveyStation { identifier: "s1".into(), name: "A1".into(), position: Vec3::ZERO },
            SurveyStation { identifier: "s2".into(), name: "A2".into(), position: Vec3::new(3.0, 0.0, 4.0) },
        ];
        scan.lines = vec![SurveyLine { start: "s1".into(), end: "s2".into() }];
        scan.location = Some(GeoLocation { latitude: 46.5, longitude: 7.9, altitude: 1200.0 });
        scan.recompute_bounds().unwrap();
        scan
    }

    pub(crate) fn legacy_record(micros: i64) -> TaggedRecord {
        let anchor = TaggedRecord::new()
            .with("identifier", "legacy-anchor")
            .with("transform", Mat4::IDENTITY)
            .with("vertices", vec![0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .with("faces", [0u32, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect::<Vec<u8>>());
        TaggedRecord::new()
            .with("timestamp", micros)
            .with("center", Vec3::new(0.5, 0.5, 0.0))
            .with("extent", Vec3::new(1.0, 1.0, 0.0))
            .with("anchors", vec![anchor])
    }

    #[test]
    fn test_roundtrip_current() {
        let scan = sample_scan("Main chamber");
        let decoded = Scan::decode(&scan.encode(6).unwrap()).unwrap();
        assert_eq!(decoded, scan);
        assert_eq!(decoded.end_snapshot.as_ref().map(|s| s.identifier.as_str()), Some("end"));
    }

    #[test]
    fn test_roundtrip_empty_collections() {
        let scan = Scan::new("Empty", clock::from_micros(42));
        let decoded = Scan::decode(&scan.encode(0).unwrap()).unwrap();
        assert_eq!(decoded, scan);
        assert!(decoded.slices.is_empty());
        assert!(decoded.stations.is_empty());
        assert!(decoded.start_snapshot.is_none());
    }

    #[test]
    fn test_bounds() {
        let scan = sample_scan("b");
        // Triangle (0,0)-(1,0)-(0,1) shifted to z = -2
        assert_eq!(scan.center, Vec3::new(0.5, 0.5, -2.0));
        assert_eq!(scan.extent, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(scan.vertex_count(), 3);
        assert_eq!(scan.face_count(), 1);
    }

    #[test]
    fn test_legacy_decode_defaults() {
        let scan = Scan::from_record(&legacy_record(0)).unwrap();
        assert_eq!(scan.schema_version(), 1);
        assert_eq!(scan.name, "Scan 1970-01-01 00:00:00");
        assert!(scan.stations.is_empty());
        assert!(scan.lines.is_empty());
        assert_eq!(scan.slices.len(), 1);
        assert_eq!(scan.slices[0].faces.triangles().unwrap(), vec![[0, 1, 2]]);
        assert_eq!(scan.slices[0].vertices.vec3s().unwrap()[1], Vec3::X);
    }

    #[test]
    fn test_upgrade_idempotent() {
        let legacy = Scan::from_record(&legacy_record(1_000_000)).unwrap();
        let once = Scan::decode(&legacy.encode(0).unwrap()).unwrap();
        let twice = Scan::decode(&once.encode(0).unwrap()).unwrap();

        assert_eq!(once.schema_version(), Scan::CURRENT_VERSION);
        assert_eq!(twice, once);
        // Only the version tag changed
        let mut relabelled = legacy.clone();
        relabelled.version = Scan::CURRENT_VERSION;
        assert_eq!(relabelled, once);
    }

    #[test]
    fn test_future_version_fatal() {
        let rec = sample_scan("x").to_record().with(VERSION_KEY, 3i64);
        let err = Scan::from_record(&rec).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchemaVersion { kind: "scan", version: 3 }));
    }

    #[test]
    fn test_missing_required_field() {
        let mut rec = sample_scan("x").to_record();
        rec.remove("center");
        assert!(matches!(Scan::from_record(&rec), Err(Error::MissingRequiredField(f)) if f == "center"));
    }

    #[test]
    fn test_bad_buffer_format_surfaces() {
        let mut rec = sample_scan("x").to_record();
        let mut slice = rec.list("slices").unwrap()[0].clone();
        let mut vertices = slice.record("vertices").unwrap().clone();
        vertices.set("format", 9i64);
        slice.set("vertices", vertices);
        rec.set("slices", vec![slice]);
        assert!(matches!(Scan::from_record(&rec), Err(Error::UnsupportedBufferFormat(9))));
    }

    #[test]
    fn test_renamed_strips_location() {
        let scan = sample_scan("orig");
        let copy = scan.renamed("copy", true);
        assert_eq!(copy.name, "copy");
        assert!(copy.location.is_none());
        assert_eq!(copy.slices, scan.slices);
        assert!(scan.renamed("keep", false).location.is_some());
    }

    #[test]
    fn test_line_stations() {
        let scan = sample_scan("l");
        let (a, b) = scan.line_stations(&scan.lines[0]).unwrap();
        assert_eq!(a.name, "A1");
        assert_eq!(b.position.length(), 5.0);
        let dangling = SurveyLine { start: "s1".into(), end: "missing".into() };
        assert!(scan.line_stations(&dangling).is_none());
    }
}
