//! Authenticated encryption for at-rest secrets
//!
//! AES-256-GCM with a fresh random 96-bit IV per encryption and a
//! 128-bit tag. The envelope layout is `IV(12) ‖ TAG(16) ‖ CIPHERTEXT`,
//! so a 64-byte seed encrypts to exactly 92 bytes. AAD is supported and
//! empty in current use. Decryption fails closed on any tag mismatch.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::Zeroizing;

use crate::rng::random_bytes;
use crate::CryptoError;

/// IV length for AES-256-GCM (96 bits).
pub const IV_LEN: usize = 12;

/// Authentication tag length (128 bits).
pub const TAG_LEN: usize = 16;

/// Key length for AES-256.
pub const KEY_LEN: usize = 32;

/// Encrypt `plaintext` under `key`, producing `IV ‖ TAG ‖ CT`.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    random_bytes(&mut iv)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    // aes-gcm appends the tag to the ciphertext
    let ct_and_tag = cipher
        .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let split = ct_and_tag.len() - TAG_LEN;
    let mut envelope = Vec::with_capacity(IV_LEN + ct_and_tag.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ct_and_tag[split..]);
    envelope.extend_from_slice(&ct_and_tag[..split]);
    Ok(envelope)
}

/// Decrypt an `IV ‖ TAG ‖ CT` envelope. The plaintext comes back in a
/// zeroizing buffer since it is usually key material.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    envelope: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if envelope.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::InvalidFormat("envelope too short".into()));
    }
    let iv = &envelope[..IV_LEN];
    let tag = &envelope[IV_LEN..IV_LEN + TAG_LEN];
    let ct = &envelope[IV_LEN + TAG_LEN..];

    // Re-join into the CT‖TAG order the aes-gcm crate expects
    let mut joined = Vec::with_capacity(ct.len() + TAG_LEN);
    joined.extend_from_slice(ct);
    joined.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: &joined, aad })
        .map_err(|_| CryptoError::DecryptionFailed("authentication failed".into()))?;

    Ok(Zeroizing::new(plaintext))
}
