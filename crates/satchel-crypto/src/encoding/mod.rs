//! Wire encodings
//!
//! Base58/Base58Check (Bitcoin alphabet), Base32 (RFC 4648, for TOTP
//! secrets), hex with optional `0x` prefix, Bitcoin VarInt, minimal
//! big-endian integers, and RLP.

pub mod base32;
pub mod base58;
pub mod hexstr;
pub mod num;
pub mod rlp;
pub mod varint;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid Base58: {0}")]
    InvalidBase58(String),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("Invalid Base32 input")]
    InvalidBase32,
    #[error("Truncated input")]
    Truncated,
    #[error("Invalid encoding: {0}")]
    Invalid(String),
}
