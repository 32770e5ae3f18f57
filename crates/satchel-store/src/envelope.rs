//! Envelope encryption for at-rest columns
//!
//! Thin wrappers over the AES-256-GCM primitive, with the vault's
//! column AAD so a blob copied between columns fails authentication.
//! Format: `IV(12) ‖ TAG(16) ‖ CIPHERTEXT`.

use zeroize::Zeroizing;

use satchel_crypto::aead;
use satchel_crypto::CryptoError;

/// AAD binding envelopes to the vault's seed column.
const SEED_COLUMN_AAD: &[u8] = b"satchel.wallets.encrypted_seed";

/// Encrypt a column value under `key`.
pub fn encrypt_blob(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    aead::encrypt(key, plaintext, SEED_COLUMN_AAD)
}

/// Decrypt a column value; fails closed on any mismatch.
pub fn decrypt_blob(key: &[u8; 32], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    aead::decrypt(key, blob, SEED_COLUMN_AAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = [0x42u8; 32];
        let blob = encrypt_blob(&key, b"inner seed envelope").unwrap();
        assert_eq!(&**decrypt_blob(&key, &blob).unwrap(), b"inner seed envelope");
    }

    #[test]
    fn test_aad_binds_column() {
        // The same key and plaintext through the raw primitive with no
        // AAD must not decrypt as a column envelope
        let key = [0x42u8; 32];
        let foreign = aead::encrypt(&key, b"payload", b"").unwrap();
        assert!(decrypt_blob(&key, &foreign).is_err());
    }
}
