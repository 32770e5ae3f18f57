//! Chain table and address codecs
//!
//! Bitcoin-family legacy P2PKH addresses (Base58Check over
//! `version ‖ Hash160(compressed pubkey)`) and EVM addresses (EIP-55
//! checksummed hex over the Keccak-256 of the uncompressed pubkey
//! body). All EVM chains share Ethereum's address format and SLIP-44
//! coin type 60.

use thiserror::Error;

use satchel_crypto::ec;
use satchel_crypto::encoding::base58;
use satchel_crypto::hash::{hash160, keccak256};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address for {chain:?}: {reason}")]
    Invalid { chain: Chain, reason: String },
    #[error("Invalid public key: {0}")]
    InvalidKey(String),
}

/// The chains this wallet derives addresses for.
///
/// EVM networks (Ethereum, BSC, Polygon, Arbitrum, Optimism, Base,
/// Avalanche-C) are a single entry here: they share derivation path and
/// address format, differing only in the transaction chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Bitcoin,
    BitcoinTestnet,
    Litecoin,
    LitecoinTestnet,
    Ethereum,
}

impl Chain {
    /// SLIP-44 / BIP-44 coin type for `m/44'/coin'/…`.
    pub fn coin_type(self) -> u32 {
        match self {
            Chain::Bitcoin => 0,
            Chain::BitcoinTestnet | Chain::LitecoinTestnet => 1,
            Chain::Litecoin => 2,
            Chain::Ethereum => 60,
        }
    }

    /// P2PKH version byte, `None` for EVM.
    pub fn version_byte(self) -> Option<u8> {
        match self {
            Chain::Bitcoin => Some(0x00),
            Chain::BitcoinTestnet | Chain::LitecoinTestnet => Some(0x6f),
            Chain::Litecoin => Some(0x30),
            Chain::Ethereum => None,
        }
    }

    /// Whether this chain uses the Bitcoin Base58Check address family.
    pub fn is_bitcoin_family(self) -> bool {
        self.version_byte().is_some()
    }
}

/// Derive the address for `chain` from a compressed public key.
pub fn address_for(chain: Chain, pubkey33: &[u8; 33]) -> Result<String, AddressError> {
    match chain.version_byte() {
        Some(version) => Ok(p2pkh_address(version, pubkey33)),
        None => evm_address(pubkey33),
    }
}

/// Legacy P2PKH: `Base58Check(version ‖ RIPEMD160(SHA256(pubkey)))`.
pub fn p2pkh_address(version: u8, pubkey33: &[u8; 33]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&hash160(pubkey33));
    base58::check_encode(&payload)
}

/// The 20-byte public-key hash inside a Bitcoin-family address.
pub fn p2pkh_pubkey_hash(chain: Chain, address: &str) -> Result<[u8; 20], AddressError> {
    let version = chain.version_byte().ok_or_else(|| AddressError::Invalid {
        chain,
        reason: "not a Base58Check chain".into(),
    })?;
    let payload = base58::check_decode(address).map_err(|e| AddressError::Invalid {
        chain,
        reason: e.to_string(),
    })?;
    if payload.len() != 21 || payload[0] != version {
        return Err(AddressError::Invalid {
            chain,
            reason: "wrong length or version byte".into(),
        });
    }
    Ok(payload[1..].try_into().expect("20 bytes"))
}

/// EVM address: Keccak-256 of the 64-byte uncompressed pubkey body,
/// last 20 bytes, EIP-55 checksummed.
pub fn evm_address(pubkey33: &[u8; 33]) -> Result<String, AddressError> {
    let uncompressed =
        ec::decompress_pubkey(pubkey33).map_err(|e| AddressError::InvalidKey(e.to_string()))?;
    let digest = keccak256(&uncompressed[1..]);
    Ok(to_checksum_address(&digest[12..]))
}

/// Apply the EIP-55 mixed-case checksum to a 20-byte address.
///
/// Each alphabetic hex digit is uppercased iff the corresponding nibble
/// of `Keccak256(lowercase_hex)` is ≥ 8.
pub fn to_checksum_address(addr20: &[u8]) -> String {
    let lower = hex::encode(addr20);
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Validate an EVM address: `0x` + 40 hex chars; all-lowercase and
/// all-uppercase are accepted unchecked, mixed case must pass EIP-55.
pub fn is_valid_evm_address(address: &str) -> bool {
    let Some(body) = address.strip_prefix("0x") else {
        return false;
    };
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower {
        // Mixed case carries a checksum
        let bytes = hex::decode(body.to_ascii_lowercase()).expect("validated hex");
        return to_checksum_address(&bytes) == address;
    }
    true
}

/// Validate an address for a specific chain.
pub fn is_valid_address(chain: Chain, address: &str) -> bool {
    match chain.version_byte() {
        None => is_valid_evm_address(address),
        Some(_) => {
            (26..=35).contains(&address.len())
                && first_char_matches(chain, address)
                && p2pkh_pubkey_hash(chain, address).is_ok()
        }
    }
}

fn first_char_matches(chain: Chain, address: &str) -> bool {
    let Some(first) = address.chars().next() else {
        return false;
    };
    match chain {
        Chain::Bitcoin => matches!(first, '1' | '3'),
        Chain::Litecoin => matches!(first, 'L' | 'M' | '3'),
        Chain::BitcoinTestnet | Chain::LitecoinTestnet => matches!(first, 'm' | 'n' | '2'),
        Chain::Ethereum => false,
    }
}

/// Best-effort chain detection from the address format alone.
///
/// EVM variants cannot be told apart (every EVM chain shares the
/// format), so any valid hex address maps to [`Chain::Ethereum`].
pub fn detect_chain(address: &str) -> Option<Chain> {
    if is_valid_evm_address(address) {
        return Some(Chain::Ethereum);
    }
    for chain in [Chain::Bitcoin, Chain::Litecoin, Chain::BitcoinTestnet] {
        if is_valid_address(chain, address) {
            return Some(chain);
        }
    }
    None
}
