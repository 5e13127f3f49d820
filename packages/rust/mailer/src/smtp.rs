//! SMTP delivery via `lettre`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use outreach_shared::{AppConfig, OutreachError, Result, SmtpConfig, read_secret};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{MailReceipt, MailTransport, OutgoingMail};

/// SMTP-backed [`MailTransport`]. The connection pool is built once.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Build a transport. `secure = true` uses implicit TLS, otherwise STARTTLS.
    pub fn new(config: &SmtpConfig, password: Option<String>) -> Result<Self> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| OutreachError::Mail(format!("SMTP relay {}: {e}", config.host)))?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let Some(pass) = password {
            if !config.user.is_empty() {
                builder = builder.credentials(Credentials::new(config.user.clone(), pass));
            }
        }

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }

    /// Build from config, reading the password from its env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.smtp, read_secret(&config.smtp.password_env))
    }
}

/// Assemble a multipart/alternative message with a fresh Message-ID.
fn build_message(mail: &OutgoingMail) -> Result<(Message, String)> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| OutreachError::Mail(format!("invalid sender {}: {e}", mail.from)))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| OutreachError::Mail(format!("invalid recipient {}: {e}", mail.to)))?;

    let domain = from.email.domain().to_string();
    let message_id = format!("<{}@{domain}>", Uuid::now_v7());

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .message_id(Some(message_id.clone()))
        .multipart(MultiPart::alternative_plain_html(
            mail.text.clone(),
            mail.html.clone(),
        ))
        .map_err(|e| OutreachError::Mail(format!("failed to build message: {e}")))?;

    Ok((message, message_id))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    #[instrument(skip_all, fields(to = %mail.to))]
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt> {
        let (message, message_id) = build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| OutreachError::Mail(e.to_string()))?;
        info!(%message_id, "message accepted");
        Ok(MailReceipt { message_id })
    }

    async fn verify(&self) -> Result<()> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OutreachError::Mail(format!(
                "SMTP server {} did not accept the connection",
                self.host
            ))),
            Err(e) => Err(OutreachError::Mail(format!("SMTP verification failed: {e}"))),
        }
    }
}
