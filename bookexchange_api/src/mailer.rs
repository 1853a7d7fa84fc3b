use std::sync::atomic::{AtomicBool, Ordering};

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::settings::MailSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(thiserror::Error, Debug)]
pub enum MailerError {
    #[error("Invalid address {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP failure {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings, from: &str) -> Result<Self, MailerError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: from.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Keeps sent emails in memory instead of delivering them
#[derive(Default)]
pub struct InMemoryMailer {
    sent: parking_lot::Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl InMemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().clone()
    }

    /// Makes every following send fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(MailerError::Other(format!(
                "Delivery to {} disabled",
                email.to
            )));
        }
        tracing::info!("Email '{}' to {} kept in memory", email.subject, email.to);
        self.sent.lock().push(email);
        Ok(())
    }
}

#[cfg(test)]
mod mailer_tests {
    use super::*;
    use crate::settings::Settings;

    #[tokio::test]
    async fn in_memory_mailer_records_and_fails_on_demand() {
        let mailer = InMemoryMailer::default();
        let email = OutgoingEmail {
            to: "reader@example.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        };

        mailer.send(email.clone()).await.unwrap();
        assert_eq!(mailer.sent(), vec![email.clone()]);

        mailer.set_failing(true);
        assert!(matches!(
            mailer.send(email.clone()).await,
            Err(MailerError::Other(..))
        ));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_invalid_recipient() {
        let settings = Settings::defaults().unwrap();
        let mailer = SmtpMailer::new(&settings.mail, "books@example.com").unwrap();
        let result = mailer
            .send(OutgoingEmail {
                to: "not an address".to_string(),
                subject: "Hello".to_string(),
                html: String::new(),
            })
            .await;
        assert!(matches!(result, Err(MailerError::Address(..))));
    }
}
