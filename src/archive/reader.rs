//! Archive decoding.

use byteorder::{ByteOrder, LittleEndian};

use super::format::*;
use super::{decompress, TaggedRecord, Value};
use crate::util::{Error, Result};

/// Maximum nesting of records inside records.
pub const MAX_DEPTH: usize = 64;

/// Decode a full archive (header + body).
pub fn decode_archive(data: &[u8]) -> Result<TaggedRecord> {
    let flags = parse_header(data)?;
    let body = &data[HEADER_SIZE..];
    if flags & FLAG_COMPRESSED != 0 {
        let inflated = decompress(body)?;
        decode_record(&inflated)
    } else {
        decode_record(body)
    }
}

/// Validate the archive header and return its flags byte.
pub fn parse_header(data: &[u8]) -> Result<u8> {
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if &data[0..4] != ARCHIVE_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let container = data[CONTAINER_VERSION_OFFSET];
    if container == 0 || container > CONTAINER_VERSION {
        return Err(Error::invalid(format!("Unknown container version: {}", container)));
    }
    Ok(data[FLAGS_OFFSET])
}

/// Decode a record body (no header). Trailing bytes are an error.
pub fn decode_record(data: &[u8]) -> Result<TaggedRecord> {
    let mut reader = BodyReader { buf: data, pos: 0 };
    let record = reader.record(0)?;
    if reader.pos != data.len() {
        return Err(Error::invalid(format!(
            "{} trailing bytes after record",
            data.len() - reader.pos
        )));
    }
    Ok(record)
}

struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(Error::UnexpectedEof(self.buf.len() as u64))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn len(&mut self) -> Result<usize> {
        let len = self.u64()?;
        usize::try_from(len).map_err(|_| Error::invalid(format!("Length overflow: {}", len)))
    }

    fn record(&mut self, depth: usize) -> Result<TaggedRecord> {
        if depth > MAX_DEPTH {
            return Err(Error::invalid("Records nested too deeply"));
        }
        let count = self.u32()?;
        let mut record = TaggedRecord::new();
        for _ in 0..count {
            let key_len = self.u16()? as usize;
            let key = String::from_utf8(self.take(key_len)?.to_vec())?;
            let tag = self.u8()?;
            let len = self.len()?;
            let payload = self.take(len)?;

            // Unknown tags come from newer writers; skip them by length.
            let Some(tag) = ValueTag::from_u8(tag) else {
                continue;
            };
            let value = decode_value(tag, payload, depth)?;
            record.insert_unique(key, value)?;
        }
        Ok(record)
    }
}

fn decode_value(tag: ValueTag, payload: &[u8], depth: usize) -> Result<Value> {
    let fixed = |size: usize| -> Result<()> {
        if payload.len() != size {
            return Err(Error::invalid(format!(
                "{} payload has {} bytes, expected {}",
                tag.name(),
                payload.len(),
                size
            )));
        }
        Ok(())
    };

    let value = match tag {
        ValueTag::Int => {
            fixed(8)?;
            Value::Int(LittleEndian::read_i64(payload))
        }
        ValueTag::Double => {
            fixed(8)?;
            Value::Double(LittleEndian::read_f64(payload))
        }
        ValueTag::Bool => {
            fixed(1)?;
            Value::Bool(payload[0] != 0)
        }
        ValueTag::Str => Value::Str(String::from_utf8(payload.to_vec())?),
        ValueTag::Bytes => Value::Bytes(payload.to_vec()),
        ValueTag::Floats => {
            if payload.len() % 4 != 0 {
                return Err(Error::invalid("floats payload not a multiple of 4"));
            }
            let mut floats = vec![0f32; payload.len() / 4];
            LittleEndian::read_f32_into(payload, &mut floats);
            Value::Floats(floats)
        }
        ValueTag::Record => {
            let mut inner = BodyReader { buf: payload, pos: 0 };
            let record = inner.record(depth + 1)?;
            if inner.pos != payload.len() {
                return Err(Error::invalid("trailing bytes in nested record"));
            }
            Value::Record(record)
        }
        ValueTag::List => {
            let mut inner = BodyReader { buf: payload, pos: 0 };
            let count = inner.u32()? as usize;
            let mut items = Vec::with_capacity(count.min(payload.len() / 12 + 1));
            for _ in 0..count {
                let len = inner.len()?;
                let body = inner.take(len)?;
                let mut item = BodyReader { buf: body, pos: 0 };
                let record = item.record(depth + 1)?;
                if item.pos != body.len() {
                    return Err(Error::invalid("trailing bytes in list item"));
                }
                items.push(record);
            }
            if inner.pos != payload.len() {
                return Err(Error::invalid("trailing bytes after list"));
            }
            Value::List(items)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{encode_archive, encode_record};
    use crate::util::{Mat4, Vec3};

    fn sample() -> TaggedRecord {
        let slice = TaggedRecord::new()
            .with("identifier", "A1")
            .with("transform", Mat4::IDENTITY);
        TaggedRecord::new()
            .with("version", 2i64)
            .with("name", "Upper gallery")
            .with("scale", 0.5f64)
            .with("flag", true)
            .with("image", vec![0xffu8, 0xd8, 0x00])
            .with("center", Vec3::new(1.0, -2.0, 3.5))
            .with("nested", TaggedRecord::new().with("x", 1i64))
            .with("slices", vec![slice.clone(), slice])
    }

    #[test]
    fn test_roundtrip_plain_and_compressed() {
        let rec = sample();
        for level in [0, 6] {
            let bytes = encode_archive(&rec, level).unwrap();
            assert_eq!(decode_archive(&bytes).unwrap(), rec);
        }
    }

    #[test]
    fn test_empty_collections_survive() {
        let rec = TaggedRecord::new()
            .with("stations", Vec::<TaggedRecord>::new())
            .with("image", Vec::<u8>::new())
            .with("floats", Vec::<f32>::new());
        let bytes = encode_record(&rec).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), rec);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode_archive(&sample(), 0).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode_archive(&bytes), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode_archive(&sample(), 0).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(decode_archive(cut), Err(Error::UnexpectedEof(_))));
        assert!(matches!(decode_archive(&bytes[..4]), Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let mut body = encode_record(&TaggedRecord::new().with("a", 1i64)).unwrap();
        // Bump the field count and append a field with an unknown tag.
        LittleEndian::write_u32(&mut body[0..4], 2);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(b'z');
        body.push(99);
        body.extend_from_slice(&3u64.to_le_bytes());
        body.extend_from_slice(&[1, 2, 3]);

        let rec = decode_record(&body).unwrap();
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.int("a").unwrap(), 1);
    }

    #[test]
    fn test_future_container_rejected() {
        let mut bytes = encode_archive(&sample(), 0).unwrap();
        bytes[CONTAINER_VERSION_OFFSET] = CONTAINER_VERSION + 1;
        assert!(matches!(decode_archive(&bytes), Err(Error::InvalidStructure(_))));
    }
}
