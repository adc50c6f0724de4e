//! Vertex component formats.

use std::fmt;

/// Per-element format of a vertex-like buffer.
///
/// Raw values match the capture pipeline's vertex format tags, so buffers
/// written by the device decode without translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum VertexFormat {
    /// One 32-bit float
    Float = 28,
    /// Two 32-bit floats
    Float2 = 29,
    /// Three 32-bit floats
    Float3 = 30,
    /// Four 32-bit floats
    Float4 = 31,
}

impl VertexFormat {
    /// Convert from the raw tag. Anything outside the float set is unsupported.
    pub const fn from_raw(v: u32) -> Option<Self> {
        match v {
            28 => Some(Self::Float),
            29 => Some(Self::Float2),
            30 => Some(Self::Float3),
            31 => Some(Self::Float4),
            _ => None,
        }
    }

    /// Raw tag value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Number of float components.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            Self::Float => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
        }
    }

    /// Size of one element in bytes.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        self.components() * std::mem::size_of::<f32>()
    }

    /// Returns the name of this format as a string.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
        }
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
