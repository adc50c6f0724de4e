//! Self-describing tagged binary archive.
//!
//! Every record and cache file is one archive: a short header followed by a
//! tree of named, typed fields. Readers skip fields they do not know, so new
//! fields can be added without breaking older files.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "CVSR"    |  4 bytes
//! +------------------+
//! | Flags            |  1 byte (bit 0 = zlib body)
//! +------------------+
//! | Container ver.   |  1 byte
//! +------------------+
//! | Reserved         |  2 bytes
//! +------------------+
//! | Body (record)    |
//! +------------------+
//! ```

mod compression;
mod file;
mod format;
mod reader;
mod value;
mod writer;

pub use compression::*;
pub use file::*;
pub use format::*;
pub use reader::*;
pub use value::*;
pub use writer::*;
