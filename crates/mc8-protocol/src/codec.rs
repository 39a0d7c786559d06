use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not enough data")]
    NotEnoughData,
    #[error("string length prefix was negative")]
    NegativeStringLength,
    #[error("opcode {0:#04x} has no decoder")]
    UnknownOpcode(u8),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// All multi-byte numerics on this wire are big-endian, which is the
/// `bytes` crate's default `get_*`/`put_*` behavior (no `_le` suffix).
pub fn read_i8(buf: &mut &[u8]) -> CodecResult<i8> {
    if buf.remaining() < 1 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_i8())
}

pub fn read_i16(buf: &mut &[u8]) -> CodecResult<i16> {
    if buf.remaining() < 2 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_i16())
}

pub fn read_i32(buf: &mut &[u8]) -> CodecResult<i32> {
    if buf.remaining() < 4 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_i32())
}

pub fn read_i64(buf: &mut &[u8]) -> CodecResult<i64> {
    if buf.remaining() < 8 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_i64())
}

pub fn read_f32(buf: &mut &[u8]) -> CodecResult<f32> {
    if buf.remaining() < 4 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_f32())
}

pub fn read_f64(buf: &mut &[u8]) -> CodecResult<f64> {
    if buf.remaining() < 8 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_f64())
}

/// Read a length-prefixed string: a signed 16-bit big-endian length `n`
/// followed by `n` single-byte characters. The original wire spec calls
/// these UCS-2; this implementation transmits them as raw single-byte
/// characters verbatim, a documented limitation (see `spec.md` §4.1/§9 —
/// non-ASCII characters round-trip as their low byte only).
pub fn read_string(buf: &mut &[u8]) -> CodecResult<String> {
    let len = read_i16(buf)?;
    if len < 0 {
        return Err(CodecError::NegativeStringLength);
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(CodecError::NotEnoughData);
    }
    let bytes = &buf[..len];
    let s = bytes.iter().map(|&b| b as char).collect();
    buf.advance(len);
    Ok(s)
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    buf.put_i16(s.chars().count() as i16);
    for c in s.chars() {
        buf.put_u8(c as u8);
    }
}
