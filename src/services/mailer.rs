use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build mail message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Outbound mail, reduced to the one message this application sends.
/// The SMTP implementation is swapped for [`LogMailer`] when mail is
/// disabled so the reset flow stays testable without a relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), MailerError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailerError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?.port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from_address.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), MailerError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(reset_subject(to))
            .header(ContentType::TEXT_PLAIN)
            .body(reset_body(reset_url))?;

        self.transport.send(email).await?;
        info!(recipient = %to, "Password reset mail sent");
        Ok(())
    }
}

/// Logs the reset link instead of delivering it. Default when mail.enabled
/// is false.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), MailerError> {
        info!(recipient = %to, %reset_url, "Mail disabled, logging password reset link");
        Ok(())
    }
}

fn reset_subject(to: &str) -> String {
    format!("Password reset for {to}")
}

fn reset_body(reset_url: &str) -> String {
    format!(
        "Follow this link to reset your password:\n\n{reset_url}\n\n\
         The link expires after ten minutes. If you did not request a reset, \
         no action is needed."
    )
}
