//! Satchel email delivery
//!
//! The core never talks SMTP directly: it holds a [`Mailer`] capability
//! and hands it rendered text. [`smtp::SmtpMailer`] is the production
//! implementation; tests use [`RecordingMailer`].

pub mod smtp;
pub mod templates;

use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Mail transport unavailable: {0}")]
    TransportUnavailable(String),
}

/// Outbound-mail capability. Implementations own transport, TLS, and
/// credentials; the caller passes plain rendered text.
pub trait Mailer: Send + Sync {
    fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Test double that records every message instead of sending.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(to, subject, body)` tuples in send order.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Mailer for RecordingMailer {
    fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// A mailer that always fails, for exercising the unavailable path.
pub struct UnavailableMailer;

impl Mailer for UnavailableMailer {
    fn send_mail(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
        Err(NotifyError::TransportUnavailable("no transport configured".into()))
    }
}
