//! secp256k1 operations
//!
//! Thin byte-oriented wrappers over the process-wide secp256k1 context
//! (`secp256k1::SECP256K1`, initialized on first use). Higher layers
//! pass 32-byte secrets and 33/65-byte points and never touch the
//! library types directly.
//!
//! All produced ECDSA signatures are low-S normalized. Tweak additions
//! that land on zero or past the curve order fail with
//! [`CryptoError::InvalidTweak`]; BIP-32 callers skip to the next index.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, PublicKey, Scalar, SecretKey, SECP256K1};

use crate::CryptoError;

/// Compressed public key length.
pub const PUBKEY_LEN: usize = 33;

/// Uncompressed public key length (0x04-prefixed).
pub const PUBKEY_UNCOMPRESSED_LEN: usize = 65;

fn secret(priv32: &[u8; 32]) -> Result<SecretKey, CryptoError> {
    SecretKey::from_slice(priv32)
        .map_err(|_| CryptoError::InvalidKey("secret key out of range [1, n-1]".into()))
}

fn pubkey(pub_bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_slice(pub_bytes)
        .map_err(|_| CryptoError::InvalidKey("not a valid curve point".into()))
}

/// Whether the 32 bytes are a valid secret key (in `[1, n-1]`).
pub fn is_valid_secret(priv32: &[u8; 32]) -> bool {
    SecretKey::from_slice(priv32).is_ok()
}

/// Compressed public key for a secret.
pub fn pubkey_from_secret(priv32: &[u8; 32]) -> Result<[u8; PUBKEY_LEN], CryptoError> {
    let sk = secret(priv32)?;
    Ok(PublicKey::from_secret_key(SECP256K1, &sk).serialize())
}

/// Uncompressed (65-byte, 0x04-prefixed) public key for a secret.
pub fn pubkey_uncompressed_from_secret(
    priv32: &[u8; 32],
) -> Result<[u8; PUBKEY_UNCOMPRESSED_LEN], CryptoError> {
    let sk = secret(priv32)?;
    Ok(PublicKey::from_secret_key(SECP256K1, &sk).serialize_uncompressed())
}

/// Re-serialize a compressed public key in uncompressed form.
pub fn decompress_pubkey(pub33: &[u8; PUBKEY_LEN]) -> Result<[u8; PUBKEY_UNCOMPRESSED_LEN], CryptoError> {
    Ok(pubkey(pub33)?.serialize_uncompressed())
}

/// ECDSA sign a 32-byte digest; compact `r ‖ s`, low-S normalized.
pub fn ecdsa_sign(priv32: &[u8; 32], msg32: &[u8; 32]) -> Result<[u8; 64], CryptoError> {
    let sk = secret(priv32)?;
    let msg = Message::from_digest(*msg32);
    let mut sig = SECP256K1.sign_ecdsa(&msg, &sk);
    sig.normalize_s();
    Ok(sig.serialize_compact())
}

/// ECDSA sign a 32-byte digest and DER-encode the result (low-S).
pub fn ecdsa_sign_der(priv32: &[u8; 32], msg32: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let sk = secret(priv32)?;
    let msg = Message::from_digest(*msg32);
    let mut sig = SECP256K1.sign_ecdsa(&msg, &sk);
    sig.normalize_s();
    Ok(sig.serialize_der().to_vec())
}

/// Recoverable ECDSA signature: compact `r ‖ s` plus the recovery id
/// (0 or 1 for the keys produced here).
pub fn ecdsa_sign_recoverable(
    priv32: &[u8; 32],
    msg32: &[u8; 32],
) -> Result<([u8; 64], u8), CryptoError> {
    let sk = secret(priv32)?;
    let msg = Message::from_digest(*msg32);
    let sig = SECP256K1.sign_ecdsa_recoverable(&msg, &sk);
    let (rec_id, compact) = sig.serialize_compact();
    Ok((compact, rec_id.to_i32() as u8))
}

/// Recover the compressed public key from a recoverable signature.
pub fn ecdsa_recover(
    msg32: &[u8; 32],
    compact64: &[u8; 64],
    rec_id: u8,
) -> Result<[u8; PUBKEY_LEN], CryptoError> {
    let id = RecoveryId::from_i32(rec_id as i32)
        .map_err(|_| CryptoError::InvalidSignature("recovery id out of range".into()))?;
    let sig = RecoverableSignature::from_compact(compact64, id)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let msg = Message::from_digest(*msg32);
    let pk = SECP256K1
        .recover_ecdsa(&msg, &sig)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    Ok(pk.serialize())
}

/// Verify a compact `r ‖ s` signature over a 32-byte digest.
pub fn ecdsa_verify(pub_bytes: &[u8], msg32: &[u8; 32], compact64: &[u8; 64]) -> bool {
    let (Ok(pk), Ok(sig)) = (pubkey(pub_bytes), Signature::from_compact(compact64)) else {
        return false;
    };
    let msg = Message::from_digest(*msg32);
    SECP256K1.verify_ecdsa(&msg, &sig, &pk).is_ok()
}

/// `priv' = (priv + tweak) mod n`, failing if the result is zero or the
/// tweak is not a valid scalar.
pub fn tweak_add_secret(priv32: &[u8; 32], tweak32: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    let sk = secret(priv32)?;
    let scalar = Scalar::from_be_bytes(*tweak32).map_err(|_| CryptoError::InvalidTweak)?;
    let tweaked = sk.add_tweak(&scalar).map_err(|_| CryptoError::InvalidTweak)?;
    Ok(tweaked.secret_bytes())
}

/// `K' = K + tweak·G`, failing on an invalid scalar or the point at
/// infinity.
pub fn tweak_add_pubkey(
    pub33: &[u8; PUBKEY_LEN],
    tweak32: &[u8; 32],
) -> Result<[u8; PUBKEY_LEN], CryptoError> {
    let pk = pubkey(pub33)?;
    let scalar = Scalar::from_be_bytes(*tweak32).map_err(|_| CryptoError::InvalidTweak)?;
    let tweaked = pk
        .add_exp_tweak(SECP256K1, &scalar)
        .map_err(|_| CryptoError::InvalidTweak)?;
    Ok(tweaked.serialize())
}
