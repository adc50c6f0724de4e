//! Archive format constants.

/// Magic bytes at the start of every archive.
pub const ARCHIVE_MAGIC: &[u8; 4] = b"CVSR";

/// Size of the archive header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Offset of the flags byte in the header.
pub const FLAGS_OFFSET: usize = 4;

/// Offset of the container version in the header.
pub const CONTAINER_VERSION_OFFSET: usize = 5;

/// Current container layout version.
pub const CONTAINER_VERSION: u8 = 1;

/// Body is zlib-compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Upper bound on a single field key, in bytes.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Wire tag for each value kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueTag {
    Int = 1,
    Double = 2,
    Bool = 3,
    Str = 4,
    Bytes = 5,
    Floats = 6,
    Record = 7,
    List = 8,
}

impl ValueTag {
    /// Convert from the on-disk byte. Unknown tags return `None` and are skipped.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Int),
            2 => Some(Self::Double),
            3 => Some(Self::Bool),
            4 => Some(Self::Str),
            5 => Some(Self::Bytes),
            6 => Some(Self::Floats),
            7 => Some(Self::Record),
            8 => Some(Self::List),
            _ => None,
        }
    }

    /// Human readable name, used in type mismatch errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Str => "string",
            Self::Bytes => "bytes",
            Self::Floats => "floats",
            Self::Record => "record",
            Self::List => "list",
        }
    }
}
