//! Base58 and Base58Check (Bitcoin alphabet)
//!
//! The check form appends the first four bytes of
//! `SHA256(SHA256(payload))` before Base58-encoding, where the payload
//! already starts with its version byte(s). Encoding/decoding is
//! delegated to `bs58`; the checksum is computed here so multi-byte
//! versions (extended keys) and single-byte versions (addresses) go
//! through one path.

use super::EncodingError;
use crate::hash::sha256d;

/// Raw Base58 encode.
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Raw Base58 decode.
pub fn decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| EncodingError::InvalidBase58(e.to_string()))
}

/// Base58Check encode: `payload ‖ SHA256d(payload)[0..4]`.
pub fn check_encode(payload: &[u8]) -> String {
    let checksum = sha256d(payload);
    let mut full = Vec::with_capacity(payload.len() + 4);
    full.extend_from_slice(payload);
    full.extend_from_slice(&checksum[..4]);
    encode(&full)
}

/// Base58Check decode, returning the payload (version bytes included)
/// after verifying the 4-byte checksum.
pub fn check_decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    let full = decode(s)?;
    if full.len() < 4 {
        return Err(EncodingError::Truncated);
    }
    let (payload, checksum) = full.split_at(full.len() - 4);
    let expected = sha256d(payload);
    if checksum != &expected[..4] {
        return Err(EncodingError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}
