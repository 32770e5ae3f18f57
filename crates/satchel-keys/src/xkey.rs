//! BIP-32 extended keys
//!
//! Master key from seed, hardened and non-hardened child derivation,
//! fingerprints, and the 78-byte Base58Check serialization with the
//! mainnet/testnet version discriminators.
//!
//! Curve-edge cases (`IL ≥ n`, zero child key, point at infinity) fail
//! with [`XkeyError::InvalidDerivation`]; per BIP-32 the caller skips to
//! the next index.

use thiserror::Error;
use zeroize::Zeroizing;

use satchel_crypto::ec;
use satchel_crypto::encoding::base58;
use satchel_crypto::hash::{hash160, hmac_sha512};

use crate::path::{DerivationPath, HARDENED_OFFSET};

/// HMAC key for master-key generation, fixed by BIP-32.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Serialized extended-key payload length (without checksum).
const SERIALIZED_LEN: usize = 78;

/// Version bytes: mainnet `xprv`/`xpub`, testnet `tprv`/`tpub`.
pub const VERSION_XPRV: u32 = 0x0488_ADE4;
pub const VERSION_XPUB: u32 = 0x0488_B21E;
pub const VERSION_TPRV: u32 = 0x0435_8394;
pub const VERSION_TPUB: u32 = 0x0435_87CF;

#[derive(Error, Debug)]
pub enum XkeyError {
    #[error("Derivation failed at this index; retry with the next one")]
    InvalidDerivation,
    #[error("Cannot derive a hardened child from a public key")]
    HardenedFromPublic,
    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),
    #[error("Invalid seed length {0}, expected 16–64 bytes")]
    InvalidSeedLength(usize),
}

/// An extended private key.
pub struct Xprv {
    pub depth: u8,
    pub parent_fingerprint: u32,
    pub child_number: u32,
    pub chain_code: [u8; 32],
    key: Zeroizing<[u8; 32]>,
}

/// An extended public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xpub {
    pub depth: u8,
    pub parent_fingerprint: u32,
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub key: [u8; ec::PUBKEY_LEN],
}

impl Xprv {
    /// Master key: `I = HMAC-SHA512("Bitcoin seed", seed)`, private key
    /// `I[0..32]`, chain code `I[32..64]`.
    pub fn new_master(seed: &[u8]) -> Result<Self, XkeyError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(XkeyError::InvalidSeedLength(seed.len()));
        }
        let i = Zeroizing::new(hmac_sha512(MASTER_HMAC_KEY, seed));

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&i[..32]);
        if !ec::is_valid_secret(&key) {
            // 2^-127 event per BIP-32; the caller regenerates the seed
            return Err(XkeyError::InvalidDerivation);
        }
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            depth: 0,
            parent_fingerprint: 0,
            child_number: 0,
            chain_code,
            key,
        })
    }

    /// The raw 32-byte secret.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Compressed public key for this node.
    pub fn public_key(&self) -> [u8; ec::PUBKEY_LEN] {
        // Key validity is an invariant of construction
        ec::pubkey_from_secret(&self.key).expect("extended key holds a valid secret")
    }

    /// Neuter into the matching extended public key.
    pub fn to_xpub(&self) -> Xpub {
        Xpub {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            key: self.public_key(),
        }
    }

    /// First four bytes of `Hash160(compressed pubkey)`, big-endian.
    pub fn fingerprint(&self) -> u32 {
        fingerprint_of(&self.public_key())
    }

    /// CKDpriv: derive the child at `index` (hardened if `index ≥ 2³¹`).
    pub fn derive_child(&self, index: u32) -> Result<Self, XkeyError> {
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        if index >= HARDENED_OFFSET {
            data.push(0x00);
            data.extend_from_slice(&*self.key);
        } else {
            data.extend_from_slice(&self.public_key());
        }
        data.extend_from_slice(&index.to_be_bytes());

        let i = Zeroizing::new(hmac_sha512(&self.chain_code, &data));
        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&i[..32]);

        // k_child = (IL + k_par) mod n; IL ≥ n or a zero result skips the index
        let child_key = Zeroizing::new(
            ec::tweak_add_secret(&self.key, &il).map_err(|_| XkeyError::InvalidDerivation)?,
        );

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key: child_key,
        })
    }

    /// Derive along a full path from this node.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, XkeyError> {
        let mut node = self.clone_node();
        for &index in path.indices() {
            node = node.derive_child(index)?;
        }
        Ok(node)
    }

    fn clone_node(&self) -> Self {
        Self {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            key: self.key.clone(),
        }
    }

    /// 78-byte Base58Check serialization with the given version.
    pub fn encode(&self, version: u32) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(SERIALIZED_LEN));
        payload.extend_from_slice(&version.to_be_bytes());
        payload.push(self.depth);
        payload.extend_from_slice(&self.parent_fingerprint.to_be_bytes());
        payload.extend_from_slice(&self.child_number.to_be_bytes());
        payload.extend_from_slice(&self.chain_code);
        payload.push(0x00);
        payload.extend_from_slice(&*self.key);
        base58::check_encode(&payload)
    }
}

impl Xpub {
    /// First four bytes of `Hash160(compressed pubkey)`, big-endian.
    pub fn fingerprint(&self) -> u32 {
        fingerprint_of(&self.key)
    }

    /// CKDpub: derive a non-hardened child. Hardened indices fail.
    pub fn derive_child(&self, index: u32) -> Result<Self, XkeyError> {
        if index >= HARDENED_OFFSET {
            return Err(XkeyError::HardenedFromPublic);
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.key);
        data.extend_from_slice(&index.to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &data);
        let mut il = [0u8; 32];
        il.copy_from_slice(&i[..32]);

        // K_child = point(IL) + K_par
        let child_key =
            ec::tweak_add_pubkey(&self.key, &il).map_err(|_| XkeyError::InvalidDerivation)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self {
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key: child_key,
        })
    }

    /// 78-byte Base58Check serialization with the given version.
    pub fn encode(&self, version: u32) -> String {
        let mut payload = Vec::with_capacity(SERIALIZED_LEN);
        payload.extend_from_slice(&version.to_be_bytes());
        payload.push(self.depth);
        payload.extend_from_slice(&self.parent_fingerprint.to_be_bytes());
        payload.extend_from_slice(&self.child_number.to_be_bytes());
        payload.extend_from_slice(&self.chain_code);
        payload.extend_from_slice(&self.key);
        base58::check_encode(&payload)
    }
}

/// An imported extended key, private or public, with its network.
pub enum ExtendedKey {
    /// `xprv` (mainnet = true) or `tprv`
    Private { key: Xprv, mainnet: bool },
    /// `xpub` (mainnet = true) or `tpub`
    Public { key: Xpub, mainnet: bool },
}

/// Parse a Base58Check-encoded extended key.
///
/// Layout: `version(4) ‖ depth(1) ‖ parentFP(4) ‖ childNumber(4) ‖
/// chainCode(32) ‖ key(33)`.
pub fn decode_extended_key(s: &str) -> Result<ExtendedKey, XkeyError> {
    let payload = Zeroizing::new(
        base58::check_decode(s).map_err(|e| XkeyError::InvalidExtendedKey(e.to_string()))?,
    );
    if payload.len() != SERIALIZED_LEN {
        return Err(XkeyError::InvalidExtendedKey(format!(
            "payload is {} bytes, expected {SERIALIZED_LEN}",
            payload.len()
        )));
    }

    let version = u32::from_be_bytes(payload[..4].try_into().expect("4 bytes"));
    let depth = payload[4];
    let parent_fingerprint = u32::from_be_bytes(payload[5..9].try_into().expect("4 bytes"));
    let child_number = u32::from_be_bytes(payload[9..13].try_into().expect("4 bytes"));
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&payload[13..45]);
    let key_bytes = &payload[45..78];

    // depth 0 ⇔ no parent
    if depth == 0 && (parent_fingerprint != 0 || child_number != 0) {
        return Err(XkeyError::InvalidExtendedKey(
            "depth-0 key with parent metadata".into(),
        ));
    }

    match version {
        VERSION_XPRV | VERSION_TPRV => {
            if key_bytes[0] != 0x00 {
                return Err(XkeyError::InvalidExtendedKey(
                    "private key must be 0x00-padded".into(),
                ));
            }
            let mut key = Zeroizing::new([0u8; 32]);
            key.copy_from_slice(&key_bytes[1..]);
            if !ec::is_valid_secret(&key) {
                return Err(XkeyError::InvalidExtendedKey("secret out of range".into()));
            }
            Ok(ExtendedKey::Private {
                key: Xprv {
                    depth,
                    parent_fingerprint,
                    child_number,
                    chain_code,
                    key,
                },
                mainnet: version == VERSION_XPRV,
            })
        }
        VERSION_XPUB | VERSION_TPUB => {
            let key: [u8; 33] = key_bytes.try_into().expect("33 bytes");
            if ec::decompress_pubkey(&key).is_err() {
                return Err(XkeyError::InvalidExtendedKey("not a curve point".into()));
            }
            Ok(ExtendedKey::Public {
                key: Xpub {
                    depth,
                    parent_fingerprint,
                    child_number,
                    chain_code,
                    key,
                },
                mainnet: version == VERSION_XPUB,
            })
        }
        other => Err(XkeyError::InvalidExtendedKey(format!(
            "unknown version 0x{other:08x}"
        ))),
    }
}

fn fingerprint_of(pubkey: &[u8; ec::PUBKEY_LEN]) -> u32 {
    let h = hash160(pubkey);
    u32::from_be_bytes([h[0], h[1], h[2], h[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// BIP-32 test vector 1 seed.
    fn vector1_seed() -> Vec<u8> {
        hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()
    }

    #[test]
    fn test_vector1_master() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        assert_eq!(
            hex::encode(master.secret_bytes()),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            hex::encode(master.chain_code),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(master.depth, 0);
        assert_eq!(master.fingerprint(), 0x3442193e);
    }

    #[test]
    fn test_vector1_master_encoding() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        assert_eq!(
            master.encode(VERSION_XPRV),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
    }

    #[test]
    fn test_vector1_child_0h() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        let child = master.derive_child(HARDENED_OFFSET).unwrap();
        assert_eq!(
            hex::encode(child.secret_bytes()),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
        assert_eq!(
            hex::encode(child.chain_code),
            "47fdacbd0f1097043b78c63c20c34ef4ed9a111d980047ad16282c7ae6236141"
        );
        assert_eq!(child.depth, 1);
        assert_eq!(child.child_number, HARDENED_OFFSET);
        assert_eq!(child.parent_fingerprint, 0x3442193e);
    }

    #[test]
    fn test_import_roundtrip() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        let encoded = master.encode(VERSION_XPRV);
        match decode_extended_key(&encoded).unwrap() {
            ExtendedKey::Private { key, mainnet } => {
                assert!(mainnet);
                assert_eq!(key.secret_bytes(), master.secret_bytes());
                assert_eq!(key.chain_code, master.chain_code);
            }
            _ => panic!("expected private key"),
        }

        let xpub = master.to_xpub();
        match decode_extended_key(&xpub.encode(VERSION_XPUB)).unwrap() {
            ExtendedKey::Public { key, mainnet } => {
                assert!(mainnet);
                assert_eq!(key, xpub);
            }
            _ => panic!("expected public key"),
        }
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(decode_extended_key("xprvNotAKey").is_err());
        // Valid Base58Check but wrong payload length
        let short = base58::check_encode(&[0u8; 10]);
        assert!(decode_extended_key(&short).is_err());
    }

    #[test]
    fn test_hardened_from_public_fails() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        let xpub = master.to_xpub();
        assert!(matches!(
            xpub.derive_child(HARDENED_OFFSET),
            Err(XkeyError::HardenedFromPublic)
        ));
        assert!(xpub.derive_child(0).is_ok());
    }

    #[test]
    fn test_neutering_commutes_with_unhardened_derivation() {
        // pub(CKDpriv(k, i)) == CKDpub(pub(k), i) for non-hardened i
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        let account = master
            .derive_path(&"m/44'/0'/0'".parse().unwrap())
            .unwrap();
        let account_pub = account.to_xpub();
        for index in [0u32, 1, 2, 1000] {
            let via_priv = account.derive_child(index).unwrap().to_xpub();
            let via_pub = account_pub.derive_child(index).unwrap();
            assert_eq!(via_priv, via_pub, "mismatch at index {index}");
        }
    }

    #[test]
    fn test_path_derivation_matches_stepwise() {
        let master = Xprv::new_master(&vector1_seed()).unwrap();
        let path: DerivationPath = "m/0'/1".parse().unwrap();
        let via_path = master.derive_path(&path).unwrap();
        let stepwise = master
            .derive_child(HARDENED_OFFSET)
            .unwrap()
            .derive_child(1)
            .unwrap();
        assert_eq!(via_path.secret_bytes(), stepwise.secret_bytes());
        assert_eq!(via_path.depth, 2);
    }

    #[test]
    fn test_seed_length_bounds() {
        assert!(Xprv::new_master(&[0u8; 15]).is_err());
        assert!(Xprv::new_master(&[0u8; 16]).is_ok());
        assert!(Xprv::new_master(&[0u8; 64]).is_ok());
        assert!(Xprv::new_master(&[0u8; 65]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_neuter_commutes(seed in proptest::collection::vec(proptest::num::u8::ANY, 32), index in 0u32..HARDENED_OFFSET) {
            let master = Xprv::new_master(&seed).unwrap();
            let hardened_base = master.derive_child(HARDENED_OFFSET).unwrap();
            let via_priv = hardened_base.derive_child(index).unwrap().to_xpub();
            let via_pub = hardened_base.to_xpub().derive_child(index).unwrap();
            proptest::prop_assert_eq!(via_priv, via_pub);
        }
    }
}
