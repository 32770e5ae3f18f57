//! Wallet repository
//!
//! Seed blobs arrive already encrypted under the user's
//! password-derived key; this layer wraps them in a second envelope
//! under the vault key before they touch disk, and unwraps on read.
//! The verification hash lets the auth layer check a password without
//! attempting decryption.

use rusqlite::Row;
use zeroize::Zeroizing;

use crate::{envelope, SqlValue, Vault, VaultError};

/// A persisted wallet row, seed blob still under the password envelope.
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// `IV ‖ TAG ‖ CT` under the password-derived key.
    pub encrypted_seed: Vec<u8>,
    /// Salt for the password KDF (32 bytes).
    pub salt: Vec<u8>,
    /// SHA-256 of the password-derived key, for cheap password checks.
    pub verification_hash: Vec<u8>,
    pub kdf_iterations: u32,
    pub created_at: i64,
}

/// Fields required to create a wallet.
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: i64,
    pub name: String,
    pub encrypted_seed: Vec<u8>,
    pub salt: Vec<u8>,
    pub verification_hash: Vec<u8>,
    pub kdf_iterations: u32,
}

/// Seed material for a wallet row, before a user id is known.
#[derive(Debug, Clone)]
pub struct WalletSeed {
    pub name: String,
    pub encrypted_seed: Vec<u8>,
    pub salt: Vec<u8>,
    pub verification_hash: Vec<u8>,
    pub kdf_iterations: u32,
}

/// Create a user and their wallet in one transaction; registration must
/// never leave a user row without seed material.
pub fn create_user_with_wallet(
    vault: &Vault,
    user: &crate::users::NewUser,
    seed: &WalletSeed,
) -> Result<(i64, i64), VaultError> {
    let outer = envelope::encrypt_blob(&vault.envelope_key(), &seed.encrypted_seed)?;

    let result = vault.transaction(|conn| {
        conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user.username, user.email, user.password_hash, Vault::now()],
        )?;
        let user_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO wallets
                 (user_id, name, encrypted_seed, salt, verification_hash, kdf_iterations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                user_id,
                seed.name,
                outer,
                seed.salt,
                seed.verification_hash,
                seed.kdf_iterations,
                Vault::now(),
            ],
        )?;
        Ok((user_id, conn.last_insert_rowid()))
    });

    vault.audit.record(
        "register",
        &format!("username={}", user.username),
        result.is_ok(),
    );
    result
}

/// Insert a wallet. At most one active wallet per user: a second insert
/// for the same user fails unless `replace` is set (restore flow).
pub fn insert(vault: &Vault, wallet: &NewWallet, replace: bool) -> Result<i64, VaultError> {
    let outer = envelope::encrypt_blob(&vault.envelope_key(), &wallet.encrypted_seed)?;

    let result = vault.transaction(|conn| {
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM wallets WHERE user_id = ?1",
            [wallet.user_id],
            |r| r.get(0),
        )?;
        if existing > 0 {
            if !replace {
                return Err(VaultError::AlreadyExists(format!(
                    "user {} already has a wallet",
                    wallet.user_id
                )));
            }
            conn.execute("DELETE FROM wallets WHERE user_id = ?1", [wallet.user_id])?;
        }
        conn.execute(
            "INSERT INTO wallets
                 (user_id, name, encrypted_seed, salt, verification_hash, kdf_iterations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                wallet.user_id,
                wallet.name,
                outer,
                wallet.salt,
                wallet.verification_hash,
                wallet.kdf_iterations,
                Vault::now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    });

    vault.audit.record(
        "insert_wallet",
        &format!("user_id={} replace={replace}", wallet.user_id),
        result.is_ok(),
    );
    result
}

const SELECT: &str = "SELECT id, user_id, name, encrypted_seed, salt, verification_hash,
    kdf_iterations, created_at FROM wallets";

/// The user's active wallet.
pub fn get_by_user(vault: &Vault, user_id: i64) -> Result<WalletRecord, VaultError> {
    let row_data = {
        let conn = vault.conn();
        let mut stmt = conn.prepare_cached(&format!("{SELECT} WHERE user_id = ?1"))?;
        let mut rows = stmt.query([user_id])?;
        match rows.next()? {
            Some(row) => collect_raw(row)?,
            None => return Err(VaultError::NotFound),
        }
    };
    unwrap_record(vault, row_data)
}

/// Replace the stored seed material atomically (restore flow).
pub fn replace_seed(
    vault: &Vault,
    wallet_id: i64,
    encrypted_seed: &[u8],
    salt: &[u8],
    verification_hash: &[u8],
    kdf_iterations: u32,
) -> Result<(), VaultError> {
    let outer = envelope::encrypt_blob(&vault.envelope_key(), encrypted_seed)?;
    let n = vault.execute(
        "UPDATE wallets SET encrypted_seed = ?1, salt = ?2, verification_hash = ?3,
             kdf_iterations = ?4
         WHERE id = ?5",
        &[
            SqlValue::Blob(outer),
            SqlValue::Blob(salt.to_vec()),
            SqlValue::Blob(verification_hash.to_vec()),
            SqlValue::Integer(i64::from(kdf_iterations)),
            SqlValue::Integer(wallet_id),
        ],
    )?;
    vault.audit.record(
        "replace_seed",
        &format!("wallet_id={wallet_id}"),
        n == 1,
    );
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

// Raw column values, extracted while the connection lock is held
struct RawWallet {
    id: i64,
    user_id: i64,
    name: String,
    outer_seed: Vec<u8>,
    salt: Vec<u8>,
    verification_hash: Vec<u8>,
    kdf_iterations: u32,
    created_at: i64,
}

fn collect_raw(row: &Row<'_>) -> Result<RawWallet, VaultError> {
    Ok(RawWallet {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        outer_seed: row.get("encrypted_seed")?,
        salt: row.get("salt")?,
        verification_hash: row.get("verification_hash")?,
        kdf_iterations: row.get("kdf_iterations")?,
        created_at: row.get("created_at")?,
    })
}

fn unwrap_record(vault: &Vault, raw: RawWallet) -> Result<WalletRecord, VaultError> {
    let inner: Zeroizing<Vec<u8>> =
        envelope::decrypt_blob(&vault.envelope_key(), &raw.outer_seed)?;
    Ok(WalletRecord {
        id: raw.id,
        user_id: raw.user_id,
        name: raw.name,
        encrypted_seed: inner.to_vec(),
        salt: raw.salt,
        verification_hash: raw.verification_hash,
        kdf_iterations: raw.kdf_iterations,
        created_at: raw.created_at,
    })
}
