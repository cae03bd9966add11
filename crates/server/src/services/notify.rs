//! Delivery of one-time codes.
//!
//! Email goes out over SMTP via lettre with Askama templates. SMS delivery is
//! not wired to a vendor; codes for phone numbers are written to the log.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use taiwanese_house_core::flow::CODE_TTL_MINUTES;
use taiwanese_house_core::{CodePurpose, Email, Identifier};

use crate::config::SmtpConfig;

/// HTML template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeEmailHtml<'a> {
    heading: &'a str,
    code: &'a str,
    minutes: i64,
}

/// Plain text template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeEmailText<'a> {
    heading: &'a str,
    code: &'a str,
    minutes: i64,
}

/// Errors that can occur when sending a code.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends verification codes to an email address or phone number.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_code(
        &self,
        to: &Identifier,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), NotifyError>;
}

const fn subject_for(purpose: CodePurpose) -> &'static str {
    match purpose {
        CodePurpose::PhoneLogin => "Your Taiwanese House sign-in code",
        CodePurpose::PasswordReset => "Reset your Taiwanese House password",
    }
}

const fn heading_for(purpose: CodePurpose) -> &'static str {
    match purpose {
        CodePurpose::PhoneLogin => "Use this code to sign in.",
        CodePurpose::PasswordReset => "Use this code to reset your password.",
    }
}

// =============================================================================
// LogNotifier
// =============================================================================

/// Log target for undelivered codes. Never forwarded to Sentry.
pub const CODE_LOG_TARGET: &str = "taiwanese_house_server::codes";

/// Writes codes to the log instead of delivering them.
///
/// Used for SMS, and for email when SMTP is not configured. Lines go to
/// [`CODE_LOG_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_code(
        &self,
        to: &Identifier,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            target: CODE_LOG_TARGET,
            to = %to.masked(),
            purpose = %purpose,
            code = %code,
            "Verification code (not delivered)"
        );
        Ok(())
    }
}

// =============================================================================
// EmailNotifier
// =============================================================================

/// Emails codes over SMTP. Phone destinations fall through to [`LogNotifier`].
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailNotifier {
    /// Create a notifier from SMTP configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_email(&self, to: &Email, purpose: CodePurpose, code: &str) -> Result<(), NotifyError> {
        let heading = heading_for(purpose);
        let html = VerificationCodeEmailHtml {
            heading,
            code,
            minutes: CODE_TTL_MINUTES,
        }
        .render()?;
        let text = VerificationCodeEmailText {
            heading,
            code,
            minutes: CODE_TTL_MINUTES,
        }
        .render()?;

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.masked()))?)
            .subject(subject_for(purpose))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to.masked(), purpose = %purpose, "Verification email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_code(
        &self,
        to: &Identifier,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), NotifyError> {
        match to {
            Identifier::Email(email) => self.send_email(email, purpose, code).await,
            Identifier::Phone(_) => LogNotifier.send_code(to, purpose, code).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_template_renders_code_and_expiry() {
        let text = VerificationCodeEmailText {
            heading: heading_for(CodePurpose::PasswordReset),
            code: "042917",
            minutes: CODE_TTL_MINUTES,
        }
        .render()
        .unwrap();

        assert!(text.contains("042917"));
        assert!(text.contains("reset your password"));
        assert!(text.contains("5 minutes"));
    }

    #[test]
    fn test_html_template_renders_code() {
        let html = VerificationCodeEmailHtml {
            heading: heading_for(CodePurpose::PhoneLogin),
            code: "123456",
            minutes: CODE_TTL_MINUTES,
        }
        .render()
        .unwrap();

        assert!(html.contains("123456"));
        assert!(html.contains("sign in"));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_phone() {
        let to = Identifier::parse("+60123456789").unwrap();
        assert!(
            LogNotifier
                .send_code(&to, CodePurpose::PhoneLogin, "123456")
                .await
                .is_ok()
        );
    }
}
