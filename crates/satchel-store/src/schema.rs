//! Schema migrations
//!
//! An ordered list of `{version, description, sql}` applied inside a
//! transaction each; `schema_version` is bumped on success and the
//! whole migration rolls back on failure.

use crate::{Vault, VaultError};

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// The migration history. Append only; never edit an applied entry.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema: users, wallets, sessions, erc20 tokens",
        sql: "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                email_verified INTEGER NOT NULL DEFAULT 0,
                verification_code TEXT,
                verification_expires_at INTEGER,
                verification_attempts INTEGER NOT NULL DEFAULT 0,
                last_verification_sent_at INTEGER,
                last_login INTEGER,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                encrypted_seed BLOB NOT NULL,
                salt BLOB NOT NULL,
                verification_hash BLOB NOT NULL,
                kdf_iterations INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX idx_wallets_user ON wallets(user_id);

            CREATE TABLE sessions (
                session_id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_activity INTEGER NOT NULL,
                totp_authenticated INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                client_metadata TEXT
            );
            CREATE INDEX idx_sessions_user ON sessions(user_id);

            CREATE TABLE erc20_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_id INTEGER NOT NULL REFERENCES wallets(id) ON DELETE CASCADE,
                contract_address TEXT NOT NULL,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(wallet_id, contract_address)
            );
        ",
    }]
}

/// Apply every migration newer than the stored version, in order.
pub fn run_migrations(vault: &Vault, list: Vec<Migration>) -> Result<(), VaultError> {
    let mut current = vault.schema_version()?;

    for migration in list {
        if migration.version <= current {
            continue;
        }
        log::info!(
            "applying vault migration v{}: {}",
            migration.version,
            migration.description
        );
        vault.transaction(|conn| {
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO schema_version (id, version, updated_at)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET version = ?1, updated_at = ?2",
                rusqlite::params![migration.version, Vault::now()],
            )?;
            Ok(())
        })?;
        vault
            .audit()
            .record("migrate", migration.description, true);
        current = migration.version;
    }
    Ok(())
}
