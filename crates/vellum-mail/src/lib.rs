//! Vellum Mail: outbound email through SMTP, with a recording backend
//! for tests and the templates used by account and collaboration flows.

mod error;
mod mailer;
pub mod templates;

pub use error::{MailError, MailResult};
pub use mailer::{Email, Mailer, MemoryMailer, SmtpConfig, SmtpMailer};
