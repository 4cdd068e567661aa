use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MailError, MailResult};

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Outbound mail. Constructed once at startup and shared as
/// `Arc<dyn Mailer>`. Callers treat failures as non-fatal.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> MailResult<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `From` header, e.g. `Vellum <no-reply@example.com>`.
    pub from: String,
    /// STARTTLS when true; plaintext otherwise (local relays only).
    pub starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 587,
            username: None,
            password: None,
            from: "Vellum <no-reply@vellum.local>".into(),
            starttls: true,
        }
    }
}

fn mailbox(address: &str) -> MailResult<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> MailResult<Self> {
        let from = mailbox(&config.from)?;
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);
        if let (Some(user), Some(pass)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build(&self, email: Email) -> MailResult<Message> {
        let to = match &email.to_name {
            Some(name) => Mailbox::new(Some(name.clone()), mailbox(&email.to)?.email),
            None => mailbox(&email.to)?,
        };
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> MailResult<()> {
        let to = email.to.clone();
        let message = self.build(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!(%to, "mail sent");
        Ok(())
    }
}

/// Records every message instead of sending it.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|e| e.to.eq_ignore_ascii_case(address))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> MailResult<()> {
        mailbox(&email.to)?;
        self.sent.lock().await.push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> Email {
        Email {
            to: to.into(),
            to_name: Some("Ada Lovelace".into()),
            subject: "Hello".into(),
            text: "plain".into(),
            html: "<p>html</p>".into(),
        }
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        mailer.send(email("ada@example.com")).await.unwrap();
        mailer.send(email("bob@example.com")).await.unwrap();

        assert_eq!(mailer.sent().await.len(), 2);
        assert_eq!(mailer.sent_to("ADA@example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let mailer = MemoryMailer::new();
        assert!(matches!(
            mailer.send(email("not an address")).await,
            Err(MailError::Address { .. })
        ));
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn smtp_message_builds_with_display_name() {
        let mailer = SmtpMailer::new(SmtpConfig {
            starttls: false,
            ..SmtpConfig::default()
        })
        .unwrap();
        let message = mailer.build(email("ada@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        let to = raw.lines().find(|l| l.starts_with("To:")).unwrap();
        assert!(to.contains("Ada Lovelace"));
        assert!(to.contains("<ada@example.com>"));
        assert!(raw.contains("Subject: Hello"));
    }
}
