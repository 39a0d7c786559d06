use crate::value::*;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum NbtReadError {
    #[error("unexpected end of NBT data")]
    Eof,
    #[error("unknown NBT tag id {0}")]
    UnknownTag(u8),
    #[error("string was not valid Latin-1/UTF-8")]
    BadString,
    #[error("gzip decompression failed: {0}")]
    Gzip(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, NbtReadError>;

/// A minimal cursor over an in-memory NBT byte buffer. This is deliberately
/// a small, narrow reader — no streaming, no schema validation beyond "is
/// this a known tag id" — matching the out-of-scope status of NBT decoding.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(NbtReadError::Eof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn nbt_string(&mut self) -> Result<String> {
        let len = self.i16()? as u16 as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| NbtReadError::BadString)
    }

    fn payload(&mut self, tag: u8) -> Result<NbtValue> {
        Ok(match tag {
            TAG_BYTE => NbtValue::Byte(self.i8()?),
            TAG_SHORT => NbtValue::Short(self.i16()?),
            TAG_INT => NbtValue::Int(self.i32()?),
            TAG_LONG => NbtValue::Long(self.i64()?),
            TAG_FLOAT => NbtValue::Float(self.f32()?),
            TAG_DOUBLE => NbtValue::Double(self.f64()?),
            TAG_BYTE_ARRAY => {
                let len = self.i32()? as usize;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(self.i8()?);
                }
                NbtValue::ByteArray(v)
            }
            TAG_STRING => NbtValue::String(self.nbt_string()?),
            TAG_LIST => {
                let item_tag = self.u8()?;
                let len = self.i32()?;
                let mut items = Vec::with_capacity(len.max(0) as usize);
                for _ in 0..len {
                    items.push(self.payload(item_tag)?);
                }
                NbtValue::List(items)
            }
            TAG_COMPOUND => {
                let mut entries = Vec::new();
                loop {
                    let entry_tag = self.u8()?;
                    if entry_tag == TAG_END {
                        break;
                    }
                    let name = self.nbt_string()?;
                    let value = self.payload(entry_tag)?;
                    entries.push((name, value));
                }
                NbtValue::Compound(entries)
            }
            TAG_INT_ARRAY => {
                let len = self.i32()? as usize;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(self.i32()?);
                }
                NbtValue::IntArray(v)
            }
            TAG_LONG_ARRAY => {
                let len = self.i32()? as usize;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(self.i64()?);
                }
                NbtValue::LongArray(v)
            }
            other => return Err(NbtReadError::UnknownTag(other)),
        })
    }
}

/// Parse a named root tag (the on-disk file convention) from raw,
/// already-decompressed NBT bytes. Returns the root value and its name.
pub fn read_named(bytes: &[u8]) -> Result<(String, NbtValue)> {
    let mut cursor = Cursor::new(bytes);
    let tag = cursor.u8()?;
    let name = cursor.nbt_string()?;
    let value = cursor.payload(tag)?;
    Ok((name, value))
}

/// Parse a gzip-compressed NBT file (the convention used by `level.dat`
/// and per-chunk `.dat` files), returning just the root value.
pub fn read_gzip_file(bytes: &[u8]) -> Result<NbtValue> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    let (_name, value) = read_named(&raw)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_a_compound_through_write_and_read() {
        let nbt = crate::nbt_compound! {
            "Level" => crate::nbt_compound! {
                "xPos" => NbtValue::Int(-3),
                "zPos" => NbtValue::Int(7),
                "Name" => NbtValue::String("hello".into()),
            },
        };

        let mut buf = BytesMut::new();
        nbt.write_root_named("", &mut buf);

        let (name, parsed) = read_named(&buf).unwrap();
        assert_eq!(name, "");
        assert_eq!(parsed, nbt);
    }

    #[test]
    fn truncated_input_is_an_error_not_a_panic() {
        let bytes = [TAG_COMPOUND, 0, 0];
        assert!(matches!(read_named(&bytes), Err(NbtReadError::Eof)));
    }

    #[test]
    fn unknown_tag_id_is_rejected() {
        let bytes = [99, 0, 0];
        assert!(matches!(read_named(&bytes), Err(NbtReadError::UnknownTag(99))));
    }
}
