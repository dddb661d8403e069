//! # Dripflow Providers
//!
//! Pluggable email delivery adapters. HTTP providers (SendGrid, Resend)
//! share the same shape: provider-specific JSON payload, bounded-timeout
//! REST call, 2xx → success with the provider's message id, anything else
//! → a failure carrying the raw provider error text. The SMTP adapter
//! relays through lettre; the mock always succeeds with a synthetic id.
//!
//! Adapters do network I/O only — the caller writes the resulting state
//! back to the delivery queue.

pub mod mock;
pub mod resend;
pub mod sendgrid;
pub mod smtp;

use dripflow_core::config::DripflowConfig;
use dripflow_core::error::{DripflowError, Result};
use dripflow_core::types::EmailSettings;

use async_trait::async_trait;

/// Bounded timeout for every outbound provider call. A timed-out call is
/// a failure, not an "unknown" — the entry is marked failed with the
/// timeout text so it stays visible for manual inspection.
pub const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// One email delivery provider.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. Returns the provider message id when the
    /// provider exposes one.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Option<String>>;
}

/// Create a provider from the latest delivery settings.
///
/// Missing credentials fail fast here — before any network call — with a
/// distinguishable error, and an unknown identifier maps to
/// `ProviderNotFound`. "none"/empty means delivery is disabled; the
/// dispatcher records that as a failed entry rather than sending.
pub fn create_provider(
    settings: &EmailSettings,
    config: &DripflowConfig,
) -> Result<Box<dyn EmailProvider>> {
    match settings.provider.to_lowercase().as_str() {
        "" | "none" => Err(DripflowError::ProviderNotConfigured),
        "mock" => Ok(Box::new(mock::MockProvider::new())),
        "sendgrid" => Ok(Box::new(sendgrid::SendGridProvider::new(settings)?)),
        "resend" => Ok(Box::new(resend::ResendProvider::new(settings)?)),
        "smtp" => Ok(Box::new(smtp::SmtpProvider::new(settings, &config.smtp)?)),
        other => Err(DripflowError::ProviderNotFound(other.to_string())),
    }
}

/// List all recognized provider identifiers.
pub fn available_providers() -> Vec<&'static str> {
    vec!["none", "mock", "sendgrid", "resend", "smtp"]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str, api_key: &str) -> EmailSettings {
        EmailSettings {
            provider: provider.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    #[test]
    fn none_is_delivery_disabled() {
        let err = create_provider(&settings("none", ""), &DripflowConfig::default()).err().unwrap();
        assert!(matches!(err, DripflowError::ProviderNotConfigured));
        let err = create_provider(&settings("", ""), &DripflowConfig::default()).err().unwrap();
        assert!(matches!(err, DripflowError::ProviderNotConfigured));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err =
            create_provider(&settings("carrier-pigeon", "k"), &DripflowConfig::default()).err().unwrap();
        assert!(matches!(err, DripflowError::ProviderNotFound(name) if name == "carrier-pigeon"));
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let err = create_provider(&settings("sendgrid", ""), &DripflowConfig::default()).err().unwrap();
        assert!(err.to_string().contains("Missing API key"));
        let err = create_provider(&settings("resend", ""), &DripflowConfig::default()).err().unwrap();
        assert!(err.to_string().contains("Missing API key"));
    }

    #[test]
    fn provider_name_is_case_insensitive() {
        let provider =
            create_provider(&settings("SendGrid", "sg-key"), &DripflowConfig::default()).unwrap();
        assert_eq!(provider.name(), "sendgrid");
    }

    #[tokio::test]
    async fn mock_always_succeeds_with_synthetic_id() {
        let provider = create_provider(&settings("mock", ""), &DripflowConfig::default()).unwrap();
        let id = provider.send("a@x.com", "Hi", "Body").await.unwrap();
        assert!(id.unwrap().starts_with("mock-"));
    }
}
