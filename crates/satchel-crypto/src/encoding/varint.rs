//! Bitcoin VarInt (CompactSize)
//!
//! Values below 0xFD encode as a single byte; larger values use the
//! 0xFD/0xFE/0xFF discriminator followed by a little-endian 2/4/8-byte
//! integer.

use super::EncodingError;

/// Append the VarInt encoding of `value` to `out`.
pub fn write(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Read a VarInt from the front of `data`, returning the value and the
/// number of bytes consumed.
pub fn read(data: &[u8]) -> Result<(u64, usize), EncodingError> {
    let first = *data.first().ok_or(EncodingError::Truncated)?;
    match first {
        0..=0xfc => Ok((u64::from(first), 1)),
        0xfd => {
            let bytes: [u8; 2] = data
                .get(1..3)
                .ok_or(EncodingError::Truncated)?
                .try_into()
                .unwrap();
            Ok((u64::from(u16::from_le_bytes(bytes)), 3))
        }
        0xfe => {
            let bytes: [u8; 4] = data
                .get(1..5)
                .ok_or(EncodingError::Truncated)?
                .try_into()
                .unwrap();
            Ok((u64::from(u32::from_le_bytes(bytes)), 5))
        }
        0xff => {
            let bytes: [u8; 8] = data
                .get(1..9)
                .ok_or(EncodingError::Truncated)?
                .try_into()
                .unwrap();
            Ok((u64::from_le_bytes(bytes), 9))
        }
    }
}
