//! Email templates

/// A rendered message ready for a [`crate::Mailer`].
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// The 2FA verification-code email. The code is the only secret in the
/// body; it expires server-side regardless of delivery.
pub fn verification_code(username: &str, code: &str, expires_minutes: u64) -> MailMessage {
    MailMessage {
        subject: "Satchel: your verification code".to_string(),
        body: format!(
            r#"Hello {username},

Your Satchel verification code is:

    {code}

The code expires in {expires_minutes} minutes. If you did not try to
sign in, you can ignore this message — your password alone is not
enough to access the wallet.

Satchel"#
        ),
    }
}

/// Notice sent after a wallet restore replaced the stored seed.
pub fn seed_restored(username: &str) -> MailMessage {
    MailMessage {
        subject: "Satchel: wallet seed was restored".to_string(),
        body: format!(
            r#"Hello {username},

The seed of your Satchel wallet was just replaced from a recovery
phrase. If this was you, no action is needed.

If it was NOT you, your account is compromised: move any funds to a
fresh wallet immediately and change your password.

Satchel"#
        ),
    }
}
