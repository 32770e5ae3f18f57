//! RLP (Recursive Length Prefix)
//!
//! The Ethereum yellow-paper serialization, encode side:
//!
//! - single byte < 0x80 → itself
//! - string, len < 56 → `0x80+len ‖ data`
//! - string, len ≥ 56 → `0xb7+lenOfLen ‖ lenBE ‖ data`
//! - list payload < 56 → `0xc0+len ‖ payload`
//! - list payload ≥ 56 → `0xf7+lenOfLen ‖ lenBE ‖ payload`
//!
//! Integers are encoded as minimal big-endian strings, so zero becomes
//! the empty string (`0x80`).

use super::num::be_minimal;

/// Encode a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    let mut out = length_prefix(data.len(), 0x80);
    out.extend_from_slice(data);
    out
}

/// Encode an unsigned integer as a minimal big-endian string.
pub fn encode_uint(value: u128) -> Vec<u8> {
    encode_bytes(&be_minimal(value))
}

/// Encode a list from already-encoded items.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = length_prefix(payload_len, 0xc0);
    out.reserve(payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_be = be_minimal(len as u128);
        let mut out = vec![offset + 55 + len_be.len() as u8];
        out.extend_from_slice(&len_be);
        out
    }
}
