//! Error types for the cavernseer store.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for record and store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh buffer bytes violate their declared layout
    #[error("Corrupt buffer: {0}")]
    CorruptBuffer(String),

    /// Vertex format tag outside the supported float formats
    #[error("Unsupported buffer format: {0}")]
    UnsupportedBufferFormat(u32),

    /// A field the decoder requires is absent or has the wrong type
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Schema version newer (or older) than anything this build understands
    #[error("Unsupported {kind} schema version: {version}")]
    UnsupportedSchemaVersion { kind: &'static str, version: i64 },

    /// Identifier already present in the store
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// Expected file is missing
    #[error("No file at location: {0}")]
    NoFileAtLocation(PathBuf),

    /// Invalid magic bytes at start of an archive
    #[error("Invalid archive: expected CVSR magic bytes")]
    InvalidMagic,

    /// Archive is truncated
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in an archive
    #[error("Invalid archive structure: {0}")]
    InvalidStructure(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Configuration (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField(field.into())
    }

    /// Create a corrupt buffer error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptBuffer(msg.into())
    }

    /// True for errors that can never be fixed by retrying the same bytes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedSchemaVersion { .. })
    }

    /// Map a `NotFound` I/O error on `path` to [`Error::NoFileAtLocation`].
    pub fn from_io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NoFileAtLocation(path.into())
        } else {
            Self::Io(err)
        }
    }
}

/// Result type alias for cavernseer operations.
pub type Result<T> = std::result::Result<T, Error>;
