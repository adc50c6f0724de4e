//! Archive encoding.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::format::*;
use super::{compress, TaggedRecord, Value};
use crate::util::{Error, Result};

/// Encode a full archive (header + body), compressing the body when
/// `compression_level > 0` and it actually saves space.
pub fn encode_archive(record: &TaggedRecord, compression_level: i32) -> Result<Vec<u8>> {
    let body = encode_record(record)?;
    let (flags, body) = match compress(&body, compression_level)? {
        Some(packed) => (FLAG_COMPRESSED, packed),
        None => (0, body),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(ARCHIVE_MAGIC);
    out.write_u8(flags)?;
    out.write_u8(CONTAINER_VERSION)?;
    out.write_u16::<LittleEndian>(0)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Encode a record body without the archive header.
pub fn encode_record(record: &TaggedRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_record(&mut buf, record)?;
    Ok(buf)
}

fn write_record(buf: &mut Vec<u8>, record: &TaggedRecord) -> Result<()> {
    buf.write_u32::<LittleEndian>(record.len() as u32)?;
    for (key, value) in record.iter() {
        if key.len() > MAX_KEY_LEN {
            return Err(Error::invalid(format!("Field key too long: {} bytes", key.len())));
        }
        buf.write_u16::<LittleEndian>(key.len() as u16)?;
        buf.extend_from_slice(key.as_bytes());
        buf.write_u8(value.tag() as u8)?;

        // Length is patched once the payload is written.
        let len_pos = buf.len();
        buf.write_u64::<LittleEndian>(0)?;
        let start = buf.len();
        write_value(buf, value)?;
        let len = (buf.len() - start) as u64;
        LittleEndian::write_u64(&mut buf[len_pos..len_pos + 8], len);
    }
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Int(v) => buf.write_i64::<LittleEndian>(*v)?,
        Value::Double(v) => buf.write_f64::<LittleEndian>(*v)?,
        Value::Bool(v) => buf.write_u8(*v as u8)?,
        Value::Str(s) => buf.extend_from_slice(s.as_bytes()),
        Value::Bytes(b) => buf.extend_from_slice(b),
        Value::Floats(f) => {
            let start = buf.len();
            buf.resize(start + f.len() * 4, 0);
            LittleEndian::write_f32_into(f, &mut buf[start..]);
        }
        Value::Record(r) => write_record(buf, r)?,
        Value::List(items) => {
            buf.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                let body = encode_record(item)?;
                buf.write_u64::<LittleEndian>(body.len() as u64)?;
                buf.extend_from_slice(&body);
            }
        }
    }
    Ok(())
}
