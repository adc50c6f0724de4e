//! Vertex-like buffers.

use super::{as_corrupt, VertexFormat};
use crate::archive::{decode_record, encode_record, TaggedRecord};
use crate::util::{Error, Result, Vec3};

/// Raw vertex data with explicit layout.
///
/// Invariant: `data.len() == offset + count * stride` and
/// `stride >= format.num_bytes()`.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshBuffer {
    data: Vec<u8>,
    count: usize,
    format: VertexFormat,
    offset: usize,
    stride: usize,
}

impl MeshBuffer {
    /// Create a buffer, validating its layout.
    pub fn new(data: Vec<u8>, count: usize, format: VertexFormat, offset: usize, stride: usize) -> Result<Self> {
        let buf = Self { data, count, format, offset, stride };
        buf.validate()?;
        Ok(buf)
    }

    /// Tightly packed `float3` buffer from positions.
    pub fn from_vec3s(points: &[Vec3]) -> Self {
        let floats: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();
        Self {
            data: bytemuck::cast_slice::<[f32; 3], u8>(&floats).to_vec(),
            count: points.len(),
            format: VertexFormat::Float3,
            offset: 0,
            stride: VertexFormat::Float3.num_bytes(),
        }
    }

    /// Check the layout invariants.
    pub fn validate(&self) -> Result<()> {
        if self.stride < self.format.num_bytes() {
            return Err(Error::corrupt(format!(
                "stride {} smaller than {} element",
                self.stride, self.format
            )));
        }
        let expected = self
            .count
            .checked_mul(self.stride)
            .and_then(|n| n.checked_add(self.offset))
            .ok_or_else(|| Error::corrupt("buffer size overflow"))?;
        if self.data.len() != expected {
            return Err(Error::corrupt(format!(
                "{} bytes for {} x {} (+{} offset)",
                self.data.len(),
                self.count,
                self.stride,
                self.offset
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes of element `index` (exactly `format.num_bytes()` long).
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.count {
            return None;
        }
        let start = self.offset + index * self.stride;
        self.data.get(start..start + self.format.num_bytes())
    }

    /// Positions of a `float3` or `float4` buffer (w is dropped).
    pub fn vec3s(&self) -> Result<Vec<Vec3>> {
        if self.format.components() < 3 {
            return Err(Error::UnsupportedBufferFormat(self.format.raw()));
        }
        (0..self.count)
            .map(|i| {
                let bytes = self
                    .element(i)
                    .ok_or_else(|| Error::corrupt(format!("element {} out of range", i)))?;
                let xyz: [f32; 3] = bytemuck::pod_read_unaligned(&bytes[..12]);
                Ok(Vec3::from_array(xyz))
            })
            .collect()
    }

    /// Tagged form used inside records.
    pub fn to_record(&self) -> TaggedRecord {
        TaggedRecord::new()
            .with("data", self.data.clone())
            .with("count", self.count as i64)
            .with("format", self.format.raw() as i64)
            .with("offset", self.offset as i64)
            .with("stride", self.stride as i64)
    }

    /// Restore from the tagged form. All-or-nothing.
    pub fn from_record(rec: &TaggedRecord) -> Result<Self> {
        let raw_format = rec.int("format").map_err(as_corrupt)?;
        let format = u32::try_from(raw_format)
            .ok()
            .and_then(VertexFormat::from_raw)
            .ok_or(Error::UnsupportedBufferFormat(raw_format as u32))?;

        Self::new(
            rec.bytes("data").map_err(as_corrupt)?.to_vec(),
            rec.usize("count").map_err(as_corrupt)?,
            format,
            rec.usize("offset").map_err(as_corrupt)?,
            rec.usize("stride").map_err(as_corrupt)?,
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
