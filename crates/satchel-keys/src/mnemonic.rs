//! BIP-39 mnemonic encoding
//!
//! Entropy ↔ mnemonic conversion and mnemonic → seed stretching. The
//! 2048-word English list comes embedded from the `bip39` crate; word
//! lookup is the crate's binary search over the pre-sorted list.
//!
//! Checksum rule: the first `ENT/32` bits of `SHA256(entropy)` are
//! appended to the entropy bits, and the concatenation is split into
//! 11-bit word indices.

use bip39::Language;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use satchel_crypto::hash::sha256;
use satchel_crypto::kdf::{pbkdf2_sha512, BIP39_ITERATIONS};
use satchel_crypto::rng;

/// Supported entropy sizes in bits.
pub const ENTROPY_BITS: [usize; 5] = [128, 160, 192, 224, 256];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MnemonicError {
    #[error("Entropy must be 128/160/192/224/256 bits, got {0}")]
    InvalidEntropyLength(usize),
    #[error("Mnemonic must have 12/15/18/21/24 words, got {0}")]
    InvalidWordCount(usize),
    #[error("Word not in list: {0}")]
    UnknownWord(String),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("RNG failure: {0}")]
    Rng(String),
}

/// An ordered, checksum-valid sequence of BIP-39 words.
///
/// Stores word indices; the words themselves are `'static` entries of
/// the embedded list. The joined phrase is only materialized on demand,
/// inside a zeroizing buffer.
pub struct Mnemonic {
    indices: Vec<u16>,
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic").field("indices", &"<redacted>").finish()
    }
}

impl Mnemonic {
    /// Generate a fresh mnemonic from CSPRNG entropy of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self, MnemonicError> {
        if !ENTROPY_BITS.contains(&bits) {
            return Err(MnemonicError::InvalidEntropyLength(bits));
        }
        let mut entropy = Zeroizing::new(vec![0u8; bits / 8]);
        rng::random_bytes(&mut entropy).map_err(|e| MnemonicError::Rng(e.to_string()))?;
        Self::from_entropy(&entropy)
    }

    /// Encode entropy into words. The caller's entropy buffer should be
    /// wiped after this returns.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, MnemonicError> {
        let ent = entropy.len() * 8;
        if !ENTROPY_BITS.contains(&ent) {
            return Err(MnemonicError::InvalidEntropyLength(ent));
        }

        let checksum = sha256(entropy);
        let checksum_bits = ent / 32;
        let total_bits = ent + checksum_bits;

        let mut indices = Vec::with_capacity(total_bits / 11);
        let bit_at = |i: usize| -> u16 {
            let byte = if i < ent {
                entropy[i / 8]
            } else {
                checksum[(i - ent) / 8]
            };
            let pos = if i < ent { i } else { i - ent };
            u16::from((byte >> (7 - pos % 8)) & 1)
        };
        for word in 0..total_bits / 11 {
            let mut index = 0u16;
            for bit in 0..11 {
                index = (index << 1) | bit_at(word * 11 + bit);
            }
            indices.push(index);
        }

        Ok(Self { indices })
    }

    /// Parse and validate a whitespace-separated phrase: every word must
    /// exist in the list and the checksum suffix must match.
    pub fn from_phrase(phrase: &str) -> Result<Self, MnemonicError> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if ![12, 15, 18, 21, 24].contains(&words.len()) {
            return Err(MnemonicError::InvalidWordCount(words.len()));
        }

        // Binary search over the pre-sorted English list (ASCII, so
        // byte order is lexicographic order)
        let list = Language::English.word_list();
        let mut indices = Vec::with_capacity(words.len());
        for word in &words {
            let index = list
                .binary_search_by(|probe| probe.as_bytes().cmp(word.as_bytes()))
                .map_err(|_| MnemonicError::UnknownWord((*word).to_string()))?;
            indices.push(index as u16);
        }

        let m = Self { indices };
        m.verify_checksum()?;
        Ok(m)
    }

    fn verify_checksum(&self) -> Result<(), MnemonicError> {
        let total_bits = self.indices.len() * 11;
        let ent = total_bits * 32 / 33;
        let checksum_bits = total_bits - ent;

        // Unpack the 11-bit indices into entropy bytes + checksum value
        let mut entropy = Zeroizing::new(vec![0u8; ent / 8]);
        let mut checksum_value = 0u8;
        for bit in 0..total_bits {
            let index = self.indices[bit / 11];
            let b = ((index >> (10 - bit % 11)) & 1) as u8;
            if bit < ent {
                entropy[bit / 8] |= b << (7 - bit % 8);
            } else {
                checksum_value = (checksum_value << 1) | b;
            }
        }

        let expected = sha256(&entropy)[0] >> (8 - checksum_bits);
        if checksum_value != expected {
            return Err(MnemonicError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Number of words.
    pub fn word_count(&self) -> usize {
        self.indices.len()
    }

    /// The words, in order.
    pub fn words(&self) -> impl Iterator<Item = &'static str> + '_ {
        let list = Language::English.word_list();
        self.indices.iter().map(move |&i| list[i as usize])
    }

    /// The phrase joined by single spaces, in a zeroizing buffer.
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.words().collect::<Vec<_>>().join(" "))
    }

    /// Stretch the mnemonic into the 64-byte BIP-39 seed:
    /// `PBKDF2-HMAC-SHA512(phrase, "mnemonic" ‖ passphrase, 2048, 64)`.
    pub fn to_seed(&self, passphrase: &str) -> Zeroizing<[u8; 64]> {
        let phrase = self.phrase();
        let mut salt = Zeroizing::new(String::with_capacity(8 + passphrase.len()));
        salt.push_str("mnemonic");
        salt.push_str(passphrase);

        let dk = pbkdf2_sha512(phrase.as_bytes(), salt.as_bytes(), BIP39_ITERATIONS, 64);
        let mut seed = Zeroizing::new([0u8; 64]);
        seed.copy_from_slice(&dk);
        seed
    }
}

impl Drop for Mnemonic {
    fn drop(&mut self) {
        self.indices.zeroize();
    }
}
