//! Body compression.
//!
//! Full-record archives carry large vertex buffers and are zlib-compressed
//! when that saves space. The flags byte in the header says which.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Refuse to inflate bodies claiming more than this many bytes.
pub const MAX_INFLATED_SIZE: usize = 1024 * 1024 * 1024;

/// Compress data using zlib.
///
/// Returns `None` when `level <= 0`, the input is empty, or the compressed
/// form would not be smaller. Output is `[uncompressed_size: u64 LE][zlib]`.
pub fn compress(data: &[u8], level: i32) -> Result<Option<Vec<u8>>> {
    if level <= 0 || data.is_empty() {
        return Ok(None);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9) as u32));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    if compressed.len() + 8 >= data.len() {
        return Ok(None);
    }

    let mut result = Vec::with_capacity(8 + compressed.len());
    result.extend_from_slice(&(data.len() as u64).to_le_bytes());
    result.extend_from_slice(&compressed);
    Ok(Some(result))
}

/// Decompress a body produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }

    let declared = LittleEndian::read_u64(&data[0..8]);
    let uncompressed_size = usize::try_from(declared)
        .ok()
        .filter(|size| *size <= MAX_INFLATED_SIZE)
        .ok_or_else(|| Error::invalid(format!("Implausible inflated size: {}", declared)))?;

    // One byte past the declared size is enough to detect a lying header.
    let mut decoder = ZlibDecoder::new(&data[8..]).take(declared + 1);
    let mut decompressed = Vec::with_capacity(uncompressed_size.min(64 * 1024 * 1024));
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::invalid(format!("zlib body: {}", e)))?;

    if decompressed.len() > uncompressed_size {
        return Err(Error::invalid(format!(
            "Inflated body exceeds declared size {}",
            uncompressed_size
        )));
    }
    if decompressed.len() != uncompressed_size {
        return Err(Error::invalid(format!(
            "Inflated {} bytes, header declared {}",
            decompressed.len(),
            uncompressed_size
        )));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"vertex vertex vertex vertex ".repeat(100);
        let compressed = compress(&original, 6).unwrap().unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_no_compression_level_zero() {
        assert!(compress(b"Short data", 0).unwrap().is_none());
    }

    #[test]
    fn test_no_compression_if_larger() {
        assert!(compress(b"Hi", 9).unwrap().is_none());
    }

    #[test]
    fn test_levels_map_directly() {
        let original = b"station line station line ".repeat(200);
        for level in 1..=9 {
            let packed = compress(&original, level).unwrap().unwrap();
            assert_eq!(decompress(&packed).unwrap(), original);
        }
        let mut direct = ZlibEncoder::new(Vec::new(), Compression::new(4));
        direct.write_all(&original).unwrap();
        assert_eq!(compress(&original, 4).unwrap().unwrap()[8..], direct.finish().unwrap()[..]);
        // above 9 clamps to 9
        assert_eq!(compress(&original, 12).unwrap(), compress(&original, 9).unwrap());
    }

    #[test]
    fn test_understated_size_stops_early() {
        // 4 MiB of zeros behind a header claiming 16 bytes
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(6));
        encoder.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        let mut bogus = 16u64.to_le_bytes().to_vec();
        bogus.extend_from_slice(&encoder.finish().unwrap());

        let err = decompress(&bogus).unwrap_err();
        assert!(err.to_string().contains("exceeds declared size 16"), "{}", err);
    }

    #[test]
    fn test_overstated_size_rejected() {
        let packed = compress(&b"abcabcabc".repeat(50), 6).unwrap().unwrap();
        let mut lying = packed.clone();
        lying[0..8].copy_from_slice(&1000u64.to_le_bytes());
        assert!(decompress(&lying).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let mut bogus = 10u64.to_le_bytes().to_vec();
        bogus.extend_from_slice(b"not zlib at all");
        assert!(decompress(&bogus).is_err());
        assert!(decompress(b"abc").is_err());
    }
}
