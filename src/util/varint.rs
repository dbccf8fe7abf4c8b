//! Variable-length integer encoding utilities.
//!
//! Lengths and counts in persisted models are stored as LEB128-style varints:
//! 7 bits per byte with a continuation bit.

use crate::error::{CodelangError, Result};

/// Maximum number of bytes a u64 varint may occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MAX_VARINT_LEN);
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        bytes.push(byte);

        if val == 0 {
            break;
        }
    }

    bytes
}

/// Decode a u64 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0u32;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(CodelangError::decode("varint overflow"));
        }

        let low = (byte & 0x7F) as u64;
        // The tenth byte may only carry the top bit of a u64.
        if shift == 63 && low > 1 {
            return Err(CodelangError::decode("varint overflow"));
        }
        result |= low << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(CodelangError::decode("incomplete varint"))
}
