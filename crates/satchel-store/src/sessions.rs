//! Session repository
//!
//! Sessions are persisted so a restart does not silently keep stale
//! logins alive. The session manager in the auth layer owns the state
//! machine; this layer only stores and updates rows. All timestamps
//! are UTC unix seconds.

use rusqlite::Row;

use crate::{SqlValue, Vault, VaultError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_activity: i64,
    pub totp_authenticated: bool,
    pub is_active: bool,
    /// Optional client info (ip address / user agent), never trusted.
    pub client_metadata: Option<String>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: row.get("session_id")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        last_activity: row.get("last_activity")?,
        totp_authenticated: row.get("totp_authenticated")?,
        is_active: row.get("is_active")?,
        client_metadata: row.get("client_metadata")?,
    })
}

const SELECT: &str = "SELECT session_id, user_id, created_at, expires_at, last_activity,
    totp_authenticated, is_active, client_metadata FROM sessions";

pub fn insert(vault: &Vault, session: &SessionRecord) -> Result<(), VaultError> {
    let result = vault.execute(
        "INSERT INTO sessions
             (session_id, user_id, created_at, expires_at, last_activity,
              totp_authenticated, is_active, client_metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        &[
            SqlValue::Text(session.session_id.clone()),
            SqlValue::Integer(session.user_id),
            SqlValue::Integer(session.created_at),
            SqlValue::Integer(session.expires_at),
            SqlValue::Integer(session.last_activity),
            SqlValue::Integer(i64::from(session.totp_authenticated)),
            SqlValue::Integer(i64::from(session.is_active)),
            match &session.client_metadata {
                Some(m) => SqlValue::Text(m.clone()),
                None => SqlValue::Null,
            },
        ],
    );
    vault.audit.record(
        "insert_session",
        &format!("user_id={}", session.user_id),
        result.is_ok(),
    );
    result?;
    Ok(())
}

pub fn get(vault: &Vault, session_id: &str) -> Result<SessionRecord, VaultError> {
    let conn = vault.conn();
    let mut stmt = conn.prepare_cached(&format!("{SELECT} WHERE session_id = ?1"))?;
    let session = stmt.query_row([session_id], from_row)?;
    Ok(session)
}

/// Slide the expiry window after a successful validation.
pub fn touch(
    vault: &Vault,
    session_id: &str,
    last_activity: i64,
    expires_at: i64,
) -> Result<(), VaultError> {
    let n = vault.execute(
        "UPDATE sessions SET last_activity = ?1, expires_at = ?2 WHERE session_id = ?3",
        &[
            SqlValue::Integer(last_activity),
            SqlValue::Integer(expires_at),
            SqlValue::Text(session_id.to_string()),
        ],
    )?;
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

/// Mark a session revoked (logout) or expired. Terminal either way.
pub fn deactivate(vault: &Vault, session_id: &str) -> Result<(), VaultError> {
    let n = vault.execute(
        "UPDATE sessions SET is_active = 0 WHERE session_id = ?1",
        &[SqlValue::Text(session_id.to_string())],
    )?;
    vault
        .audit
        .record("deactivate_session", session_id, n == 1);
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}

/// All still-active sessions for a user.
pub fn active_for_user(vault: &Vault, user_id: i64) -> Result<Vec<SessionRecord>, VaultError> {
    let conn = vault.conn();
    let mut stmt =
        conn.prepare_cached(&format!("{SELECT} WHERE user_id = ?1 AND is_active = 1"))?;
    let sessions = stmt
        .query_map([user_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

/// Drop rows whose expiry is in the past. Returns how many went away.
pub fn cleanup_expired(vault: &Vault, now: i64) -> Result<usize, VaultError> {
    let n = vault.execute(
        "DELETE FROM sessions WHERE expires_at < ?1",
        &[SqlValue::Integer(now)],
    )?;
    if n > 0 {
        vault
            .audit
            .record("cleanup_sessions", &format!("removed={n}"), true);
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_temp_vault;
    use crate::users::{self, NewUser};

    fn make_user(vault: &Vault) -> i64 {
        users::insert(
            vault,
            &NewUser {
                username: "session-user".into(),
                email: "s@example.com".into(),
                password_hash: "hash".into(),
            },
        )
        .unwrap()
    }

    fn sample(user_id: i64, id: &str, now: i64) -> SessionRecord {
        SessionRecord {
            session_id: id.into(),
            user_id,
            created_at: now,
            expires_at: now + 900,
            last_activity: now,
            totp_authenticated: false,
            is_active: true,
            client_metadata: Some("cli".into()),
        }
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let (_dir, vault) = open_temp_vault();
        let user_id = make_user(&vault);
        let now = Vault::now();
        let session = sample(user_id, "s1", now);
        insert(&vault, &session).unwrap();
        assert_eq!(get(&vault, "s1").unwrap(), session);
    }

    #[test]
    fn test_touch_slides_expiry() {
        let (_dir, vault) = open_temp_vault();
        let user_id = make_user(&vault);
        let now = Vault::now();
        insert(&vault, &sample(user_id, "s1", now)).unwrap();

        touch(&vault, "s1", now + 60, now + 60 + 900).unwrap();
        let updated = get(&vault, "s1").unwrap();
        assert_eq!(updated.last_activity, now + 60);
        assert_eq!(updated.expires_at, now + 960);
    }

    #[test]
    fn test_deactivate() {
        let (_dir, vault) = open_temp_vault();
        let user_id = make_user(&vault);
        let now = Vault::now();
        insert(&vault, &sample(user_id, "s1", now)).unwrap();
        insert(&vault, &sample(user_id, "s2", now)).unwrap();

        deactivate(&vault, "s1").unwrap();
        let active = active_for_user(&vault, user_id).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, "s2");
    }

    #[test]
    fn test_cleanup_expired() {
        let (_dir, vault) = open_temp_vault();
        let user_id = make_user(&vault);
        let now = Vault::now();
        let mut old = sample(user_id, "old", now - 3600);
        old.expires_at = now - 1800;
        insert(&vault, &old).unwrap();
        insert(&vault, &sample(user_id, "fresh", now)).unwrap();

        assert_eq!(cleanup_expired(&vault, now).unwrap(), 1);
        assert!(matches!(get(&vault, "old"), Err(VaultError::NotFound)));
        assert!(get(&vault, "fresh").is_ok());
    }

    #[test]
    fn test_duplicate_session_id_rejected() {
        let (_dir, vault) = open_temp_vault();
        let user_id = make_user(&vault);
        let now = Vault::now();
        insert(&vault, &sample(user_id, "dup", now)).unwrap();
        assert!(matches!(
            insert(&vault, &sample(user_id, "dup", now)),
            Err(VaultError::AlreadyExists(_))
        ));
    }
}
