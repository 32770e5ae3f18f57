//! Online vault backup
//!
//! Copies pages into a fresh database file in 100-page batches through
//! SQLite's backup API, then verifies the copy's integrity before
//! reporting success. The backup inherits the same envelope model; the
//! original key opens it.

use std::path::Path;

use rusqlite::backup::{Backup, StepResult};
use rusqlite::Connection;

use crate::{Vault, VaultError};

/// Pages copied per backup step.
const PAGES_PER_BATCH: std::ffi::c_int = 100;

/// Back the vault up to `dest`. Fails if `dest` already exists.
pub fn create_backup(vault: &Vault, dest: &Path) -> Result<(), VaultError> {
    if dest.exists() {
        return Err(VaultError::InvalidInput(format!(
            "backup target already exists: {}",
            dest.display()
        )));
    }

    let src = vault.conn();
    let mut dst = Connection::open(dest).map_err(VaultError::from)?;

    {
        let backup = Backup::new(&src, &mut dst)?;
        loop {
            match backup.step(PAGES_PER_BATCH)? {
                StepResult::Done => break,
                StepResult::More => continue,
                StepResult::Busy | StepResult::Locked => {
                    return Err(VaultError::Busy);
                }
                _ => {
                    return Err(VaultError::Busy);
                }
            }
        }
    }

    // Verify the copy before calling it a backup
    {
        let mut stmt = dst.prepare("PRAGMA integrity_check(100)")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let line: String = row.get(0)?;
            if line != "ok" {
                return Err(VaultError::Corrupt(format!("backup failed check: {line}")));
            }
        }
    }
    drop(dst);

    vault
        .audit()
        .record("backup", dest.to_string_lossy().as_ref(), true);
    log::info!("vault backed up to {}", dest.display());
    Ok(())
}
