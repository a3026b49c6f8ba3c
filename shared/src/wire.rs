//! Little-endian byte codec used for object payloads and level files.
//!
//! Object data is packed field by field rather than run through serde so
//! that a partially readable buffer can still be recovered from (see the
//! corrupted-object fallback in `protocol`).

use glam::{IVec2, Vec2};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound for length-prefixed strings. Anything larger is treated as
/// garbage rather than an allocation request.
pub const MAX_STRING_LEN: u32 = 1 << 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of buffer: needed {needed} more bytes, {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("string length {0} exceeds limit of {MAX_STRING_LEN} bytes")]
    StringTooLong(u32),
    #[error("string is not valid utf-8")]
    BadUtf8,
}

#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_uuid(&mut self, value: Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_ivec2(&mut self, value: IVec2) {
        self.write_i32(value.x);
        self.write_i32(value.y);
    }

    pub fn write_vec2(&mut self, value: Vec2) {
        self.write_f32(value.x);
        self.write_f32(value.y);
    }

    /// UTF-8 bytes prefixed with their length as a `u32`.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Raw bytes without a length prefix; the enclosing format must know
    /// where they end.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < count {
            return Err(WireError::UnexpectedEnd {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, WireError> {
        let bytes = self.take(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Uuid::from_bytes(raw))
    }

    pub fn read_ivec2(&mut self) -> Result<IVec2, WireError> {
        Ok(IVec2::new(self.read_i32()?, self.read_i32()?))
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, WireError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()?;
        if len > MAX_STRING_LEN {
            return Err(WireError::StringTooLong(len));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadUtf8)
    }

    /// Everything not yet consumed.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_primitive_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_u8(7);
        writer.write_i32(-42);
        writer.write_u32(123_456);
        writer.write_u64(9_876_543_210);
        writer.write_f32(1.5);

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_u32().unwrap(), 123_456);
        assert_eq!(reader.read_u64().unwrap(), 9_876_543_210);
        assert_approx_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_vector_and_uuid_round_trip() {
        let id = Uuid::new_v4();
        let mut writer = ByteWriter::new();
        writer.write_uuid(id);
        writer.write_ivec2(IVec2::new(-3, 99));
        writer.write_vec2(Vec2::new(0.25, -8.5));

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_uuid().unwrap(), id);
        assert_eq!(reader.read_ivec2().unwrap(), IVec2::new(-3, 99));
        assert_eq!(reader.read_vec2().unwrap(), Vec2::new(0.25, -8.5));
    }

    #[test]
    fn test_string_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_string("hello_-123");
        writer.write_string("");

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "hello_-123");
        assert_eq!(reader.read_string().unwrap(), "");
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut writer = ByteWriter::new();
        writer.write_u8(1);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        reader.read_u8().unwrap();
        assert_eq!(
            reader.read_i32(),
            Err(WireError::UnexpectedEnd {
                needed: 4,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_truncated_string_fails() {
        let mut writer = ByteWriter::new();
        writer.write_u32(10);
        writer.write_u8(b'a');
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(WireError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_oversized_string_length_rejected() {
        let mut writer = ByteWriter::new();
        writer.write_u32(MAX_STRING_LEN + 1);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            reader.read_string(),
            Err(WireError::StringTooLong(MAX_STRING_LEN + 1))
        );
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut writer = ByteWriter::new();
        writer.write_u32(2);
        writer.write_u8(0xff);
        writer.write_u8(0xfe);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(WireError::BadUtf8));
    }

    #[test]
    fn test_position_tracks_consumed_bytes() {
        let mut writer = ByteWriter::new();
        writer.write_i32(1);
        writer.write_vec2(Vec2::ZERO);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.position(), 0);
        reader.read_i32().unwrap();
        assert_eq!(reader.position(), 4);
        reader.read_vec2().unwrap();
        assert_eq!(reader.position(), 12);
    }
}
