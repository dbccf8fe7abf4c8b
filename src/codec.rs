//! Binary framing shared by every backend's model encoding.
//!
//! A persisted model is laid out as:
//!
//! ```text
//! magic   [u8; 4]   backend-specific tag
//! version u16       little-endian
//! body    ...       varint lengths, UTF-8 strings, f64 as raw little-endian bits
//! crc32   u32       checksum of every preceding byte
//! ```
//!
//! [`ModelReader::open`] checks the frame (size, magic, version, checksum)
//! before handing out any body field, so a decoder never builds a model from
//! bytes that were truncated or corrupted.

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{CodelangError, Result};
use crate::util::varint::{decode_u64, encode_u64};

/// Size of the magic tag.
pub const MAGIC_LEN: usize = 4;

/// Size of magic plus version.
pub const HEADER_LEN: usize = MAGIC_LEN + 2;

/// Size of the checksum trailer.
pub const TRAILER_LEN: usize = 4;

/// Writer for a framed model encoding.
#[derive(Debug)]
pub struct ModelWriter {
    buf: Vec<u8>,
}

impl ModelWriter {
    /// Start a new encoding with the given magic tag and format version.
    pub fn new(magic: &[u8; MAGIC_LEN], version: u16) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(magic);
        let mut raw = [0u8; 2];
        LittleEndian::write_u16(&mut raw, version);
        buf.extend_from_slice(&raw);
        ModelWriter { buf }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) {
        self.buf.extend_from_slice(&encode_u64(value));
    }

    /// Write a length or count.
    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    /// Write a f64 value as its raw bits.
    pub fn write_f64(&mut self, value: f64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_f64(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) {
        self.write_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write a list of strings with a count prefix.
    pub fn write_strings(&mut self, values: &[String]) {
        self.write_len(values.len());
        for value in values {
            self.write_string(value);
        }
    }

    /// Write a list of f64 values with a count prefix.
    pub fn write_f64s(&mut self, values: &[f64]) {
        self.write_len(values.len());
        for &value in values {
            self.write_f64(value);
        }
    }

    /// Append the checksum and return the finished encoding.
    pub fn finish(mut self) -> Vec<u8> {
        let checksum = crc32fast::hash(&self.buf);
        self.write_u32(checksum);
        self.buf
    }
}

/// Reader for a framed model encoding.
pub struct ModelReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ModelReader<'a> {
    /// Validate the frame of `data` and position the reader at the body.
    pub fn open(data: &'a [u8], magic: &[u8; MAGIC_LEN], version: u16) -> Result<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(CodelangError::decode(format!(
                "model data too short: {} bytes",
                data.len()
            )));
        }

        if &data[..MAGIC_LEN] != magic {
            return Err(CodelangError::decode(format!(
                "invalid magic: expected {}, found {}",
                String::from_utf8_lossy(magic),
                String::from_utf8_lossy(&data[..MAGIC_LEN])
            )));
        }

        let found = LittleEndian::read_u16(&data[MAGIC_LEN..HEADER_LEN]);
        if found != version {
            return Err(CodelangError::decode(format!(
                "unsupported version {found} (expected {version})"
            )));
        }

        let (framed, trailer) = data.split_at(data.len() - TRAILER_LEN);
        let stored = LittleEndian::read_u32(trailer);
        let computed = crc32fast::hash(framed);
        if stored != computed {
            return Err(CodelangError::decode(format!(
                "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            )));
        }

        let mut cursor = Cursor::new(framed);
        cursor.set_position(HEADER_LEN as u64);
        Ok(ModelReader { cursor })
    }

    fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len();
        total.saturating_sub(self.cursor.position() as usize)
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(truncated)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(truncated)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let pos = self.cursor.position() as usize;
        let rest = self.cursor.get_ref().get(pos..).unwrap_or(&[]);
        let (value, read) = decode_u64(rest)?;
        self.cursor.set_position((pos + read) as u64);
        Ok(value)
    }

    /// Read a length prefix for `elem_size`-byte elements.
    ///
    /// Fails when the declared length cannot fit in the remaining input, so
    /// a corrupted length never triggers a large allocation.
    pub fn read_len(&mut self, elem_size: usize) -> Result<usize> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| CodelangError::decode(format!("length {len} out of range")))?;
        let needed = len.checked_mul(elem_size.max(1));
        match needed {
            Some(needed) if needed <= self.remaining() => Ok(len),
            _ => Err(CodelangError::decode(format!(
                "declared length {len} exceeds remaining {} bytes",
                self.remaining()
            ))),
        }
    }

    /// Read a f64 value from its raw bits.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(truncated)
    }

    /// Read a finite f64 value.
    pub fn read_finite_f64(&mut self) -> Result<f64> {
        let value = self.read_f64()?;
        if !value.is_finite() {
            return Err(CodelangError::decode("non-finite parameter"));
        }
        Ok(value)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len(1)?;
        let mut bytes = vec![0u8; len];
        self.cursor.read_exact(&mut bytes).map_err(truncated)?;
        String::from_utf8(bytes).map_err(|e| CodelangError::decode(format!("invalid UTF-8: {e}")))
    }

    /// Read a list of strings with a count prefix.
    pub fn read_strings(&mut self) -> Result<Vec<String>> {
        let count = self.read_len(1)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_string()?);
        }
        Ok(values)
    }

    /// Read a list of finite f64 values with a count prefix.
    pub fn read_f64s(&mut self) -> Result<Vec<f64>> {
        let count = self.read_len(8)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_finite_f64()?);
        }
        Ok(values)
    }

    /// Read exactly `expected` finite f64 values written with [`ModelWriter::write_f64s`].
    pub fn read_f64s_exact(&mut self, expected: usize, what: &str) -> Result<Vec<f64>> {
        let values = self.read_f64s()?;
        if values.len() != expected {
            return Err(CodelangError::decode(format!(
                "{what}: expected {expected} values, found {}",
                values.len()
            )));
        }
        Ok(values)
    }

    /// Ensure the whole body has been consumed.
    pub fn finish(self) -> Result<()> {
        let remaining = self.remaining();
        if remaining != 0 {
            return Err(CodelangError::decode(format!(
                "{remaining} trailing bytes after model body"
            )));
        }
        Ok(())
    }
}

fn truncated(e: std::io::Error) -> CodelangError {
    CodelangError::decode(format!("unexpected end of model data: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: &[u8; 4] = b"TEST";

    fn sample() -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, 1);
        writer.write_u8(7);
        writer.write_string("func");
        writer.write_f64s(&[0.25, 1.5]);
        writer.finish()
    }

    #[test]
    fn test_write_read_fields() {
        let data = sample();
        let mut reader = ModelReader::open(&data, MAGIC, 1).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_string().unwrap(), "func");
        assert_eq!(reader.read_f64s().unwrap(), vec![0.25, 1.5]);
        reader.finish().unwrap();
    }

    #[test]
    fn test_rejects_wrong_magic_and_version() {
        let data = sample();
        assert!(ModelReader::open(&data, b"NOPE", 1).is_err());
        assert!(ModelReader::open(&data, MAGIC, 2).is_err());
    }

    #[test]
    fn test_rejects_corruption() {
        let mut data = sample();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        let err = ModelReader::open(&data, MAGIC, 1).err().unwrap();
        assert!(err.is_decode());
    }

    #[test]
    fn test_rejects_truncation() {
        let data = sample();
        for len in 0..data.len() {
            assert!(ModelReader::open(&data[..len], MAGIC, 1).is_err());
        }
    }

    #[test]
    fn test_rejects_oversized_length() {
        let mut writer = ModelWriter::new(MAGIC, 1);
        writer.write_varint(1 << 40);
        let data = writer.finish();
        let mut reader = ModelReader::open(&data, MAGIC, 1).unwrap();
        assert!(reader.read_string().unwrap_err().is_decode());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let data = sample();
        let mut reader = ModelReader::open(&data, MAGIC, 1).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert!(reader.finish().unwrap_err().is_decode());
    }
}
