//! Face (index) buffers.

use byteorder::{ByteOrder, LittleEndian};

use super::as_corrupt;
use crate::archive::{decode_record, encode_record, TaggedRecord};
use crate::util::{Error, Result};

/// Primitive index data.
///
/// `count` is the number of primitives; each has `indices_per_primitive`
/// indices of `bytes_per_index` bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexBuffer {
    data: Vec<u8>,
    bytes_per_index: usize,
    count: usize,
    indices_per_primitive: usize,
}

impl IndexBuffer {
    /// Create a buffer, validating its layout.
    pub fn new(data: Vec<u8>, bytes_per_index: usize, count: usize, indices_per_primitive: usize) -> Result<Self> {
        let buf = Self { data, bytes_per_index, count, indices_per_primitive };
        buf.validate()?;
        Ok(buf)
    }

    /// 32-bit triangle list.
    pub fn from_triangles(triangles: &[[u32; 3]]) -> Self {
        let mut data = vec![0u8; triangles.len() * 12];
        let flat: Vec<u32> = triangles.iter().flatten().copied().collect();
        LittleEndian::write_u32_into(&flat, &mut data);
        Self {
            data,
            bytes_per_index: 4,
            count: triangles.len(),
            indices_per_primitive: 3,
        }
    }

    /// Check the layout invariants.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.bytes_per_index, 1 | 2 | 4) {
            return Err(Error::corrupt(format!("{} bytes per index", self.bytes_per_index)));
        }
        if self.indices_per_primitive == 0 {
            return Err(Error::corrupt("zero indices per primitive"));
        }
        let expected = self
            .count
            .checked_mul(self.indices_per_primitive)
            .and_then(|n| n.checked_mul(self.bytes_per_index))
            .ok_or_else(|| Error::corrupt("index buffer size overflow"))?;
        if self.data.len() != expected {
            return Err(Error::corrupt(format!(
                "{} bytes for {} primitives of {} x {}",
                self.data.len(),
                self.count,
                self.indices_per_primitive,
                self.bytes_per_index
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn bytes_per_index(&self) -> usize {
        self.bytes_per_index
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn indices_per_primitive(&self) -> usize {
        self.indices_per_primitive
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// All indices widened to `u32`.
    pub fn indices(&self) -> Vec<u32> {
        match self.bytes_per_index {
            1 => self.data.iter().map(|b| *b as u32).collect(),
            2 => self.data.chunks_exact(2).map(|c| LittleEndian::read_u16(c) as u32).collect(),
            _ => self.data.chunks_exact(4).map(LittleEndian::read_u32).collect(),
        }
    }

    /// Triangles of a three-index buffer.
    pub fn triangles(&self) -> Result<Vec<[u32; 3]>> {
        if self.indices_per_primitive != 3 {
            return Err(Error::corrupt(format!(
                "{} indices per primitive, expected triangles",
                self.indices_per_primitive
            )));
        }
        Ok(self
            .indices()
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect())
    }

    /// Tagged form used inside records.
    pub fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("data", self.data.clone())
            .with("bytesPerIndex", self.bytes_per_index as i64)
            .with("count", self.count as i64)
            .with("indicesPerPrimitive", self.indices_per_primitive as i64)
    }

    /// Restore from the tagged form. All-or-nothing.
    pub fn from_record(rec: &TaggedRecord) -> Result<Self> {
        Self::new(
            rec.bytes("data").map_err(as_corrupt)?.to_vec(),
            rec.usize("bytesPerIndex").map_err(as_corrupt)?,
            rec.usize("count").map_err(as_corrupt)?,
            rec.usize("indicesPerPrimitive").map_err(as_corrupt)?,
        )
    }

    /// Standalone byte encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_record(&self.to_record())
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_record(&decode_record(bytes)?)
    }
}
