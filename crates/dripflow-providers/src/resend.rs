//! Resend adapter — `POST /emails`.
//!
//! The message id comes back in the response JSON `id` field.

use async_trait::async_trait;
use dripflow_core::error::{DripflowError, Result};
use dripflow_core::types::EmailSettings;
use serde_json::{Value, json};

use crate::{EmailProvider, SEND_TIMEOUT};

const RESEND_SEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendProvider {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendProvider {
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(DripflowError::ApiKeyMissing("resend".into()));
        }
        let from = if settings.from_name.is_empty() {
            settings.from_email.clone()
        } else {
            format!("{} <{}>", settings.from_name, settings.from_email)
        };
        Ok(Self {
            api_key: settings.api_key.clone(),
            from,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Option<String>> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "text": body,
        });

        let resp = self
            .client
            .post(RESEND_SEND_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DripflowError::Http(format!(
                        "resend timed out after {}s",
                        SEND_TIMEOUT.as_secs()
                    ))
                } else {
                    DripflowError::Http(format!("resend request failed: {e}"))
                }
            })?;

        if resp.status().is_success() {
            let json: Value = resp
                .json()
                .await
                .map_err(|e| DripflowError::Http(e.to_string()))?;
            let message_id = json["id"].as_str().map(String::from);
            tracing::info!("📤 Resend accepted message for {to}");
            Ok(message_id)
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(DripflowError::Provider(format!(
                "resend API error {status}: {text}"
            )))
        }
    }
}
