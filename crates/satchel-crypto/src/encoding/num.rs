//! Minimal big-endian integer encoding
//!
//! No leading zero bytes; zero encodes to the empty string. This is the
//! numeric form RLP and the script/amount fields build on.

use super::EncodingError;

/// Big-endian bytes of `value` with leading zeros stripped.
pub fn be_minimal(value: u128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

/// Parse minimal big-endian bytes back into a `u128`.
///
/// Rejects non-minimal encodings (leading zero) and values that do not
/// fit in 128 bits.
pub fn u128_from_be_minimal(bytes: &[u8]) -> Result<u128, EncodingError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes[0] == 0 {
        return Err(EncodingError::Invalid("leading zero byte".into()));
    }
    if bytes.len() > 16 {
        return Err(EncodingError::Invalid("integer wider than 128 bits".into()));
    }
    let mut value: u128 = 0;
    for &b in bytes {
        value = (value << 8) | u128::from(b);
    }
    Ok(value)
}
