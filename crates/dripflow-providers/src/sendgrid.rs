//! SendGrid adapter — v3 Mail Send API.
//!
//! Maps 200/202 to success with the `X-Message-Id` response header as the
//! provider message id; non-2xx carries the raw response body so operators
//! can diagnose without extra tooling.

use async_trait::async_trait;
use dripflow_core::error::{DripflowError, Result};
use dripflow_core::types::EmailSettings;
use serde_json::json;

use crate::{EmailProvider, SEND_TIMEOUT};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridProvider {
    api_key: String,
    from_email: String,
    from_name: String,
    client: reqwest::Client,
}

impl SendGridProvider {
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(DripflowError::ApiKeyMissing("sendgrid".into()));
        }
        Ok(Self {
            api_key: settings.api_key.clone(),
            from_email: settings.from_email.clone(),
            from_name: settings.from_name.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Option<String>> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }], "subject": subject }],
            "from": { "email": self.from_email, "name": self.from_name },
            "content": [{ "type": "text/plain", "value": body }],
        });

        let resp = self
            .client
            .post(SENDGRID_SEND_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DripflowError::Http(format!(
                        "sendgrid timed out after {}s",
                        SEND_TIMEOUT.as_secs()
                    ))
                } else {
                    DripflowError::Http(format!("sendgrid request failed: {e}"))
                }
            })?;

        if resp.status().is_success() {
            let message_id = resp
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            tracing::info!("📤 SendGrid accepted message for {to}");
            Ok(message_id)
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(DripflowError::Provider(format!(
                "sendgrid API error {status}: {text}"
            )))
        }
    }
}
