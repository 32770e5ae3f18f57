//! Session lifecycle
//!
//! `NEW → ACTIVE → (EXPIRED | REVOKED)`. A session becomes ACTIVE on
//! its first validation; every later successful validation slides
//! `expires_at` to `now + 15 min` and records the activity. EXPIRED and
//! REVOKED are terminal. Rows live in the vault so restarts do not
//! resurrect stale logins.

use std::sync::Arc;

use satchel_crypto::rng;
use satchel_store::sessions::{self, SessionRecord};
use satchel_store::{Vault, VaultError};

use crate::AuthError;

/// Idle lifetime; validation slides the window.
pub const SESSION_LIFETIME_SECS: i64 = 15 * 60;

/// Random bytes behind a session id (hex-encoded to 64 chars).
pub const SESSION_ID_BYTES: usize = 32;

/// Lifecycle states as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, never validated.
    New,
    /// Validated at least once and inside its window.
    Active,
    /// Ran past `expires_at`; terminal.
    Expired,
    /// Logged out; terminal.
    Revoked,
}

pub struct SessionManager {
    vault: Arc<Vault>,
}

impl SessionManager {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self { vault }
    }

    /// Create a NEW session for a user. Returns the session id.
    pub fn create(
        &self,
        user_id: i64,
        totp_authenticated: bool,
        client_metadata: Option<String>,
    ) -> Result<String, AuthError> {
        let id_bytes: [u8; SESSION_ID_BYTES] = rng::random_array()?;
        let session_id = hex::encode(id_bytes);
        let now = Vault::now();

        sessions::insert(
            &self.vault,
            &SessionRecord {
                session_id: session_id.clone(),
                user_id,
                created_at: now,
                expires_at: now + SESSION_LIFETIME_SECS,
                last_activity: now,
                totp_authenticated,
                is_active: true,
                client_metadata,
            },
        )?;
        log::debug!("session created for user {user_id}");
        Ok(session_id)
    }

    /// Validate a session and slide its expiry. Returns the owning
    /// user id.
    pub fn validate(&self, session_id: &str) -> Result<i64, AuthError> {
        self.validate_at(session_id, Vault::now())
    }

    pub(crate) fn validate_at(&self, session_id: &str, now: i64) -> Result<i64, AuthError> {
        let record = match sessions::get(&self.vault, session_id) {
            Ok(r) => r,
            Err(VaultError::NotFound) => return Err(AuthError::SessionInvalid),
            Err(e) => return Err(e.into()),
        };

        if !record.is_active {
            return Err(AuthError::SessionInvalid);
        }
        if now > record.expires_at {
            // Terminal: mark revoked-equivalent and refuse; no sliding
            sessions::deactivate(&self.vault, session_id)?;
            return Err(AuthError::SessionExpired);
        }

        sessions::touch(
            &self.vault,
            session_id,
            now,
            now + SESSION_LIFETIME_SECS,
        )?;
        Ok(record.user_id)
    }

    /// Revoke (logout). Terminal.
    pub fn revoke(&self, session_id: &str) -> Result<(), AuthError> {
        match sessions::deactivate(&self.vault, session_id) {
            Ok(()) => Ok(()),
            Err(VaultError::NotFound) => Err(AuthError::SessionInvalid),
            Err(e) => Err(e.into()),
        }
    }

    /// The state of a session, without sliding anything.
    pub fn state(&self, session_id: &str) -> Result<SessionState, AuthError> {
        self.state_at(session_id, Vault::now())
    }

    pub(crate) fn state_at(&self, session_id: &str, now: i64) -> Result<SessionState, AuthError> {
        let record = match sessions::get(&self.vault, session_id) {
            Ok(r) => r,
            Err(VaultError::NotFound) => return Err(AuthError::SessionInvalid),
            Err(e) => return Err(e.into()),
        };
        Ok(if !record.is_active {
            SessionState::Revoked
        } else if now > record.expires_at {
            SessionState::Expired
        } else if record.last_activity == record.created_at {
            SessionState::New
        } else {
            SessionState::Active
        })
    }

    /// Whether the session carried a completed TOTP challenge.
    pub fn is_totp_authenticated(&self, session_id: &str) -> Result<bool, AuthError> {
        let record = sessions::get(&self.vault, session_id).map_err(|e| match e {
            VaultError::NotFound => AuthError::SessionInvalid,
            other => other.into(),
        })?;
        Ok(record.totp_authenticated)
    }

    /// Drop expired rows. Returns how many were removed.
    pub fn cleanup(&self) -> Result<usize, AuthError> {
        Ok(sessions::cleanup_expired(&self.vault, Vault::now())?)
    }
}
