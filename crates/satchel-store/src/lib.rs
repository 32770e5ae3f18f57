//! Satchel vault — the at-rest store for users, wallets, sessions, and
//! token registrations.
//!
//! A single SQLite database behind a process-wide handle. Every secret
//! column is wrapped in an AES-256-GCM envelope under the vault key
//! (seed blobs carry a second, inner envelope under the user's
//! password-derived key, so vault-key rotation never needs user
//! passwords). A keyed check row makes `open` fail on a wrong key the
//! same way an encrypted-page store would.
//!
//! Access rules:
//! - every query runs under the vault lock
//! - parameters are always bound, never interpolated, and capped at
//!   100 per statement / 1 MB per parameter
//! - every mutation lands in the audit log

pub mod audit;
pub mod backup;
pub mod envelope;
pub mod schema;
pub mod sessions;
pub mod tokens;
pub mod users;
pub mod wallets;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;
use zeroize::Zeroizing;

use satchel_crypto::ct::ct_eq;
use satchel_crypto::hash::{hmac_sha256, sha256};
use satchel_crypto::CryptoError;

use audit::AuditLog;

/// Minimum raw key length accepted by [`Vault::open`].
pub const MIN_KEY_LEN: usize = 32;

/// Bound-parameter caps.
pub const MAX_PARAMS_PER_STATEMENT: usize = 100;
pub const MAX_PARAM_BYTES: usize = 1024 * 1024;

/// Statement watchdog.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Domain separator for the stored key-check MAC.
const KEYCHECK_CONTEXT: &[u8] = b"satchel-vault-keycheck-v1";

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault key must be at least {MIN_KEY_LEN} bytes")]
    KeyTooShort,
    #[error("Wrong vault key")]
    WrongKey,
    #[error("Vault corrupt: {0}")]
    Corrupt(String),
    #[error("Vault busy")]
    Busy,
    #[error("Not found")]
    NotFound,
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Crypto failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Database error: {0}")]
    Sql(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => VaultError::NotFound,
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    VaultError::AlreadyExists(msg.clone().unwrap_or_default())
                }
                rusqlite::ErrorCode::DatabaseBusy => VaultError::Busy,
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    VaultError::Corrupt(e.to_string())
                }
                _ => VaultError::Sql(e.to_string()),
            },
            _ => VaultError::Sql(e.to_string()),
        }
    }
}

/// The process-wide vault handle.
pub struct Vault {
    conn: Mutex<Connection>,
    key: Mutex<Zeroizing<[u8; 32]>>,
    audit: AuditLog,
    path: PathBuf,
}

impl Vault {
    /// Open (or create) the vault at `path` with `raw_key` (≥ 32 bytes,
    /// typically derived from the user password plus machine entropy).
    ///
    /// A wrong key for an existing vault fails with
    /// [`VaultError::WrongKey`]; proof of a correct key is the stored
    /// check MAC, read right after the pragmas.
    pub fn open(path: &Path, raw_key: &[u8]) -> Result<Self, VaultError> {
        Self::open_with_audit(path, raw_key, None)
    }

    /// [`Vault::open`] with an append-only audit file alongside the
    /// in-memory ring buffer.
    pub fn open_with_audit(
        path: &Path,
        raw_key: &[u8],
        audit_path: Option<&Path>,
    ) -> Result<Self, VaultError> {
        if raw_key.len() < MIN_KEY_LEN {
            return Err(VaultError::KeyTooShort);
        }
        // Compress the caller's key into the fixed-width envelope key
        let key = Zeroizing::new(sha256(raw_key));

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        apply_pragmas(&conn)?;

        let audit = AuditLog::new(audit_path).map_err(|e| VaultError::Io(e.to_string()))?;
        let vault = Self {
            conn: Mutex::new(conn),
            key: Mutex::new(key),
            audit,
            path: path.to_path_buf(),
        };

        vault.bootstrap()?;
        vault.verify_key()?;
        schema::run_migrations(&vault, schema::migrations())?;
        vault.audit.record("open", path.to_string_lossy().as_ref(), true);
        log::info!("vault opened at {}", path.display());
        Ok(vault)
    }

    /// Where this vault lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The audit log for this handle.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; propagating the
        // poison would wedge every later call, so take the data anyway
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn envelope_key(&self) -> Zeroizing<[u8; 32]> {
        self.key.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run `f` inside a transaction; rollback on error.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&Connection) -> Result<R, VaultError>,
    ) -> Result<R, VaultError> {
        let conn = self.conn();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Execute one bound statement through the guarded choke point:
    /// statement screening plus the parameter count/size caps.
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, VaultError> {
        check_statement(sql)?;
        check_params(params)?;
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(sql)?;
        let n = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
        Ok(n)
    }

    fn bootstrap(&self) -> Result<(), VaultError> {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS vault_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Prove the key: compare the stored check MAC (constant time), or
    /// store it on first open.
    fn verify_key(&self) -> Result<(), VaultError> {
        let expected = hex::encode(hmac_sha256(&*self.envelope_key(), KEYCHECK_CONTEXT));
        let conn = self.conn();
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM vault_meta WHERE key = 'keycheck'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match stored {
            Some(mac) if ct_eq(mac.as_bytes(), expected.as_bytes()) => Ok(()),
            Some(_) => Err(VaultError::WrongKey),
            None => {
                conn.execute(
                    "INSERT INTO vault_meta (key, value) VALUES ('keycheck', ?1)",
                    [&expected],
                )?;
                Ok(())
            }
        }
    }

    /// Current schema version (0 before the first migration).
    pub fn schema_version(&self) -> Result<i64, VaultError> {
        let conn = self.conn();
        let version = conn
            .query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| {
                r.get(0)
            })
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(0),
                other => Err(other),
            })?;
        Ok(version)
    }

    /// Integrity self-test: `integrity_check` plus `foreign_key_check`.
    pub fn verify_integrity(&self) -> Result<(), VaultError> {
        let conn = self.conn();

        let mut stmt = conn.prepare("PRAGMA integrity_check(100)")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let line: String = row.get(0)?;
            if line != "ok" {
                return Err(VaultError::Corrupt(line));
            }
        }

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(VaultError::Corrupt("foreign key violation".into()));
        }
        Ok(())
    }

    /// Rotate the vault key: re-encrypt every vault-keyed envelope
    /// column and swap the check MAC, all in one transaction.
    pub fn rotate_key(&self, new_raw_key: &[u8]) -> Result<(), VaultError> {
        if new_raw_key.len() < MIN_KEY_LEN {
            return Err(VaultError::KeyTooShort);
        }
        let old_key = self.envelope_key();
        let new_key = Zeroizing::new(sha256(new_raw_key));
        let new_check = hex::encode(hmac_sha256(&*new_key, KEYCHECK_CONTEXT));

        self.transaction(|conn| {
            let mut stmt = conn.prepare("SELECT id, encrypted_seed FROM wallets")?;
            let rows: Vec<(i64, Vec<u8>)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<_, _>>()?;
            drop(stmt);

            for (id, blob) in rows {
                let inner = envelope::decrypt_blob(&old_key, &blob)?;
                let rewrapped = envelope::encrypt_blob(&new_key, &inner)?;
                conn.execute(
                    "UPDATE wallets SET encrypted_seed = ?1 WHERE id = ?2",
                    rusqlite::params![rewrapped, id],
                )?;
            }

            conn.execute(
                "UPDATE vault_meta SET value = ?1 WHERE key = 'keycheck'",
                [&new_check],
            )?;
            Ok(())
        })?;

        *self.key.lock().unwrap_or_else(|e| e.into_inner()) = new_key;
        self.audit.record("rotate_key", "", true);
        log::info!("vault key rotated");
        Ok(())
    }

    /// Close the handle, wiping the key. Any pending transaction on the
    /// connection is rolled back by SQLite on close.
    pub fn close(self) {
        self.audit.record("close", "", true);
        // key and conn drop here; Zeroizing wipes the key bytes
    }

    /// Current UTC time as unix seconds; the single clock every stored
    /// timestamp uses.
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A bound parameter for [`Vault::execute`].
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), VaultError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "secure_delete", "ON")?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "cache_size", -64000)?; // 64 MB
    Ok(())
}

/// Screen a statement headed for [`Vault::execute`]: single statement
/// only, no engine escape hatches.
fn check_statement(sql: &str) -> Result<(), VaultError> {
    let upper = sql.to_ascii_uppercase();
    for forbidden in ["ATTACH", "DETACH", "LOAD_EXTENSION"] {
        if upper.contains(forbidden) {
            return Err(VaultError::InvalidInput(format!(
                "statement contains {forbidden}"
            )));
        }
    }
    // Reject stacked statements; one trailing semicolon is fine
    if sql.trim_end().trim_end_matches(';').contains(';') {
        return Err(VaultError::InvalidInput("stacked statements".into()));
    }
    Ok(())
}

fn check_params(params: &[SqlValue]) -> Result<(), VaultError> {
    if params.len() > MAX_PARAMS_PER_STATEMENT {
        return Err(VaultError::InvalidInput(format!(
            "{} parameters exceeds the cap of {MAX_PARAMS_PER_STATEMENT}",
            params.len()
        )));
    }
    for p in params {
        let len = match p {
            SqlValue::Text(s) => s.len(),
            SqlValue::Blob(b) => b.len(),
            _ => 0,
        };
        if len > MAX_PARAM_BYTES {
            return Err(VaultError::InvalidInput(format!(
                "parameter of {len} bytes exceeds the 1 MB cap"
            )));
        }
    }
    Ok(())
}
