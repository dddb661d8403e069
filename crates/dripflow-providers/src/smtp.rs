//! SMTP relay adapter — async lettre over STARTTLS.
//!
//! Relay host and credentials come from the `[smtp]` config section; the
//! from address comes from the runtime settings so it rotates with them.
//! SMTP exposes no provider message id.

use async_trait::async_trait;
use dripflow_core::config::SmtpConfig;
use dripflow_core::error::{DripflowError, Result};
use dripflow_core::types::EmailSettings;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::Mailbox, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

use crate::{EmailProvider, SEND_TIMEOUT};

pub struct SmtpProvider {
    host: String,
    port: u16,
    username: String,
    password: String,
    from_email: String,
    from_name: String,
}

impl SmtpProvider {
    pub fn new(settings: &EmailSettings, smtp: &SmtpConfig) -> Result<Self> {
        if smtp.host.is_empty() {
            return Err(DripflowError::Config("SMTP host not configured".into()));
        }
        if smtp.username.is_empty() || smtp.password.is_empty() {
            return Err(DripflowError::ApiKeyMissing("smtp".into()));
        }
        Ok(Self {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from_email: settings.from_email.clone(),
            from_name: settings.from_name.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Option<String>> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.from_name, self.from_email)
            .parse()
            .map_err(|e| DripflowError::Provider(format!("Invalid from address: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| DripflowError::Provider(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DripflowError::Provider(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| DripflowError::Provider(format!("SMTP relay: {e}")))?
            .port(self.port)
            .credentials(creds)
            .timeout(Some(SEND_TIMEOUT))
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| DripflowError::Provider(format!("SMTP send: {e}")))?;

        tracing::info!("📤 SMTP relayed message for {to}");
        Ok(None)
    }
}
