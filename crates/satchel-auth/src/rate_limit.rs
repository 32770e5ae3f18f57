//! Login rate limiting
//!
//! Sliding one-minute window per identifier: five failures trips a
//! ten-minute lockout. Successful authentication clears the record.
//! State is in-memory; a restart forgets it, which only ever helps an
//! attacker who already has local code execution.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::AuthError;

/// Window within which failures accumulate.
pub const WINDOW_SECS: i64 = 60;

/// Failures allowed inside one window.
pub const MAX_ATTEMPTS: u32 = 5;

/// Lockout once the window is exhausted.
pub const LOCKOUT_SECS: i64 = 600;

#[derive(Debug, Clone, Default)]
struct Entry {
    attempt_count: u32,
    window_start: i64,
    lockout_until: Option<i64>,
}

#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate an attempt. Call before checking credentials.
    pub fn check(&self, identifier: &str) -> Result<(), AuthError> {
        self.check_at(identifier, chrono::Utc::now().timestamp())
    }

    /// Record a failed attempt; returns how many remain in the window.
    pub fn record_failure(&self, identifier: &str) -> u32 {
        self.record_failure_at(identifier, chrono::Utc::now().timestamp())
    }

    /// Forget an identifier (successful login).
    pub fn clear(&self, identifier: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identifier);
    }

    fn check_at(&self, identifier: &str, now: i64) -> Result<(), AuthError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = entries.get_mut(identifier) else {
            return Ok(());
        };

        if let Some(until) = entry.lockout_until {
            if now < until {
                return Err(AuthError::RateLimited {
                    retry_after_secs: (until - now) as u64,
                });
            }
            // Lockout elapsed; start fresh
            entries.remove(identifier);
            return Ok(());
        }

        if now - entry.window_start >= WINDOW_SECS {
            entries.remove(identifier);
            return Ok(());
        }

        if entry.attempt_count >= MAX_ATTEMPTS {
            let until = now + LOCKOUT_SECS;
            entry.lockout_until = Some(until);
            return Err(AuthError::RateLimited {
                retry_after_secs: LOCKOUT_SECS as u64,
            });
        }
        Ok(())
    }

    fn record_failure_at(&self, identifier: &str, now: i64) -> u32 {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(identifier.to_string()).or_insert(Entry {
            attempt_count: 0,
            window_start: now,
            lockout_until: None,
        });

        if now - entry.window_start >= WINDOW_SECS && entry.lockout_until.is_none() {
            entry.attempt_count = 0;
            entry.window_start = now;
        }
        entry.attempt_count += 1;

        if entry.attempt_count >= MAX_ATTEMPTS {
            entry.lockout_until = Some(now + LOCKOUT_SECS);
            0
        } else {
            MAX_ATTEMPTS - entry.attempt_count
        }
    }
}
