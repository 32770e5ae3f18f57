//! SMTP transport (lettre, blocking)

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};

use crate::{Mailer, NotifyError};

/// SMTP connection settings. The password is expected to come from the
/// OS keystore or environment, not a world-readable config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

fn default_port() -> u16 {
    587
}

/// Blocking SMTP mailer with STARTTLS.
pub struct SmtpMailer {
    config: SmtpConfig,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| NotifyError::TransportUnavailable(format!("SMTP relay: {e}")))?
            .credentials(creds)
            .port(config.port)
            .build();
        Ok(Self { config, transport })
    }
}

impl Mailer for SmtpMailer {
    fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| NotifyError::InvalidAddress(format!("from: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| NotifyError::InvalidAddress(format!("to: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::InvalidAddress(format!("message build: {e}")))?;

        self.transport
            .send(&email)
            .map_err(|e| NotifyError::TransportUnavailable(format!("SMTP send: {e}")))?;

        log::info!("email sent to {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builds_with_valid_addresses() {
        let email = Message::builder()
            .from("noreply@satchel.dev".parse().unwrap())
            .to("user@example.com".parse().unwrap())
            .subject("test")
            .body("body".to_string());
        assert!(email.is_ok());
    }

    #[test]
    fn test_default_port() {
        let toml = r#"
            host = "smtp.example.com"
            username = "u"
            password = "p"
            from_address = "noreply@example.com"
        "#;
        let config: SmtpConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 587);
    }

    // Actual SMTP delivery needs a live server; covered by manual runs
}
