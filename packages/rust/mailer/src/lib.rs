//! Outbound mail delivery.
//!
//! [`MailTransport`] is the seam the send stage talks to; [`SmtpMailer`]
//! implements it with the `lettre` async SMTP transport.

mod smtp;

use async_trait::async_trait;
use outreach_shared::{BusinessConfig, Result};

pub use smtp::SmtpMailer;

/// A fully addressed outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// RFC 5322 mailbox, e.g. `Ada <ada@ada.dev>`.
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingMail {
    /// Address a message from the operator to `to`.
    ///
    /// The HTML part is the text body with newlines turned into `<br>`.
    pub fn from_business(business: &BusinessConfig, to: &str, subject: &str, body: &str) -> Self {
        Self {
            from: sender_mailbox(&business.name, &business.email),
            to: to.to_string(),
            subject: subject.to_string(),
            text: body.to_string(),
            html: to_html(body),
        }
    }
}

/// Transport acknowledgement for one accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailReceipt {
    pub message_id: String,
}

/// A mail delivery backend.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message. Failures are per-recipient.
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt>;

    /// Check connectivity and credentials without sending anything.
    async fn verify(&self) -> Result<()>;
}

/// Plain text to minimal HTML: newlines become `<br>`.
pub fn to_html(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br>")
}

/// `Name <email>`, or just the address when no name is configured.
pub fn sender_mailbox(name: &str, email: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        email.trim().to_string()
    } else {
        format!("{name} <{}>", email.trim())
    }
}
