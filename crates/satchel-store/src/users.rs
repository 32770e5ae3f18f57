//! User repository

use rusqlite::Row;

use crate::{SqlValue, Vault, VaultError};

/// A persisted user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub verification_code: Option<String>,
    pub verification_expires_at: Option<i64>,
    pub verification_attempts: u32,
    pub last_verification_sent_at: Option<i64>,
    pub last_login: Option<i64>,
    pub created_at: i64,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        email_verified: row.get("email_verified")?,
        verification_code: row.get("verification_code")?,
        verification_expires_at: row.get("verification_expires_at")?,
        verification_attempts: row.get("verification_attempts")?,
        last_verification_sent_at: row.get("last_verification_sent_at")?,
        last_login: row.get("last_login")?,
        created_at: row.get("created_at")?,
    })
}

const SELECT: &str = "SELECT id, username, email, password_hash, email_verified,
    verification_code, verification_expires_at, verification_attempts,
    last_verification_sent_at, last_login, created_at FROM users";

/// Insert a new user; username collisions surface as `AlreadyExists`.
pub fn insert(vault: &Vault, user: &NewUser) -> Result<i64, VaultError> {
    let result = vault.execute(
        "INSERT INTO users (username, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        &[
            SqlValue::Text(user.username.clone()),
            SqlValue::Text(user.email.clone()),
            SqlValue::Text(user.password_hash.clone()),
            SqlValue::Integer(Vault::now()),
        ],
    );
    vault.audit.record(
        "insert_user",
        &format!("username={}", user.username),
        result.is_ok(),
    );
    result?;
    let id = vault.conn().last_insert_rowid();
    Ok(id)
}

pub fn get_by_username(vault: &Vault, username: &str) -> Result<UserRecord, VaultError> {
    let conn = vault.conn();
    let mut stmt = conn.prepare_cached(&format!("{SELECT} WHERE username = ?1"))?;
    let user = stmt.query_row([username], from_row)?;
    Ok(user)
}

pub fn get_by_id(vault: &Vault, id: i64) -> Result<UserRecord, VaultError> {
    let conn = vault.conn();
    let mut stmt = conn.prepare_cached(&format!("{SELECT} WHERE id = ?1"))?;
    let user = stmt.query_row([id], from_row)?;
    Ok(user)
}

/// Record a successful login.
pub fn touch_last_login(vault: &Vault, id: i64) -> Result<(), VaultError> {
    vault.execute(
        "UPDATE users SET last_login = ?1 WHERE id = ?2",
        &[SqlValue::Integer(Vault::now()), SqlValue::Integer(id)],
    )?;
    Ok(())
}

/// Store a fresh verification code, resetting the attempt counter.
pub fn set_verification_code(
    vault: &Vault,
    id: i64,
    code: &str,
    expires_at: i64,
) -> Result<(), VaultError> {
    let n = vault.execute(
        "UPDATE users SET verification_code = ?1, verification_expires_at = ?2,
             verification_attempts = 0, last_verification_sent_at = ?3
         WHERE id = ?4",
        &[
            SqlValue::Text(code.to_string()),
            SqlValue::Integer(expires_at),
            SqlValue::Integer(Vault::now()),
            SqlValue::Integer(id),
        ],
    )?;
    vault
        .audit
        .record("set_verification_code", &format!("user_id={id}"), n == 1);
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

/// Bump the failed-attempt counter and return the new value.
pub fn bump_verification_attempts(vault: &Vault, id: i64) -> Result<u32, VaultError> {
    vault.execute(
        "UPDATE users SET verification_attempts = verification_attempts + 1 WHERE id = ?1",
        &[SqlValue::Integer(id)],
    )?;
    let conn = vault.conn();
    let attempts =
        conn.query_row("SELECT verification_attempts FROM users WHERE id = ?1", [id], |r| {
            r.get(0)
        })?;
    Ok(attempts)
}

/// Mark the email verified and clear the code state.
pub fn mark_email_verified(vault: &Vault, id: i64) -> Result<(), VaultError> {
    let n = vault.execute(
        "UPDATE users SET email_verified = 1, verification_code = NULL,
             verification_expires_at = NULL, verification_attempts = 0
         WHERE id = ?1",
        &[SqlValue::Integer(id)],
    )?;
    vault
        .audit
        .record("mark_email_verified", &format!("user_id={id}"), n == 1);
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

/// Update the stored password hash (used on password change).
pub fn set_password_hash(vault: &Vault, id: i64, hash: &str) -> Result<(), VaultError> {
    let n = vault.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        &[SqlValue::Text(hash.to_string()), SqlValue::Integer(id)],
    )?;
    vault
        .audit
        .record("set_password_hash", &format!("user_id={id}"), n == 1);
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

/// Delete a user (wallets and sessions cascade).
pub fn delete(vault: &Vault, id: i64) -> Result<(), VaultError> {
    let n = vault.execute("DELETE FROM users WHERE id = ?1", &[SqlValue::Integer(id)])?;
    vault.audit.record("delete_user", &format!("user_id={id}"), n == 1);
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_temp_vault;

    fn alice() -> NewUser {
        NewUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "pbkdf2-sha256$100000$c2FsdA$ZGs".into(),
        }
    }

    #[test]
    fn test_insert_and_read_roundtrip() {
        let (_dir, vault) = open_temp_vault();
        let id = insert(&vault, &alice()).unwrap();
        let user = get_by_username(&vault, "alice").unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "alice@example.com");
        assert!(!user.email_verified);
        assert_eq!(user.verification_attempts, 0);
        assert_eq!(get_by_id(&vault, id).unwrap(), user);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (_dir, vault) = open_temp_vault();
        insert(&vault, &alice()).unwrap();
        assert!(matches!(
            insert(&vault, &alice()),
            Err(VaultError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let (_dir, vault) = open_temp_vault();
        assert!(matches!(
            get_by_username(&vault, "nobody"),
            Err(VaultError::NotFound)
        ));
    }

    #[test]
    fn test_delete_then_read_is_not_found() {
        let (_dir, vault) = open_temp_vault();
        let id = insert(&vault, &alice()).unwrap();
        delete(&vault, id).unwrap();
        assert!(matches!(
            get_by_username(&vault, "alice"),
            Err(VaultError::NotFound)
        ));
        assert!(matches!(delete(&vault, id), Err(VaultError::NotFound)));
    }

    #[test]
    fn test_verification_code_lifecycle() {
        let (_dir, vault) = open_temp_vault();
        let id = insert(&vault, &alice()).unwrap();

        set_verification_code(&vault, id, "123456", Vault::now() + 600).unwrap();
        let user = get_by_id(&vault, id).unwrap();
        assert_eq!(user.verification_code.as_deref(), Some("123456"));
        assert!(user.last_verification_sent_at.is_some());

        assert_eq!(bump_verification_attempts(&vault, id).unwrap(), 1);
        assert_eq!(bump_verification_attempts(&vault, id).unwrap(), 2);

        mark_email_verified(&vault, id).unwrap();
        let user = get_by_id(&vault, id).unwrap();
        assert!(user.email_verified);
        assert!(user.verification_code.is_none());
        assert_eq!(user.verification_attempts, 0);
    }

    #[test]
    fn test_touch_last_login() {
        let (_dir, vault) = open_temp_vault();
        let id = insert(&vault, &alice()).unwrap();
        assert!(get_by_id(&vault, id).unwrap().last_login.is_none());
        touch_last_login(&vault, id).unwrap();
        assert!(get_by_id(&vault, id).unwrap().last_login.is_some());
    }
}
