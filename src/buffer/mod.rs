//! Raw mesh geometry buffers.
//!
//! Buffers carry their layout explicitly so they can be stored and restored
//! without knowing what produced them:
//! - [`VertexFormat`] - closed set of supported float formats
//! - [`MeshBuffer`] - vertex-like buffer (count, stride, format, offset)
//! - [`IndexBuffer`] - face buffer (bytes per index, indices per primitive)
//!
//! Element bytes are stored in the native little-endian layout the capture
//! pipeline hands over.

mod format;
mod index;
mod vertex;

pub use format::*;
pub use index::*;
pub use vertex::*;

use crate::util::Error;

/// Missing or mistyped fields inside a buffer record are buffer corruption.
pub(crate) fn as_corrupt(err: Error) -> Error {
    match err {
        Error::MissingRequiredField(field) => Error::CorruptBuffer(format!("missing {}", field)),
        other => other,
    }
}
