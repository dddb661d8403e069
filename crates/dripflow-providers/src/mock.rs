//! Mock adapter for local development and test fixtures.
//!
//! Always succeeds, and still produces a distinct synthetic message id so
//! downstream assertions can check for its presence.

use async_trait::async_trait;
use dripflow_core::error::Result;

use crate::EmailProvider;

#[derive(Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<Option<String>> {
        let message_id = format!("mock-{}", uuid::Uuid::new_v4());
        tracing::debug!("📤 Mock delivery to {to}: '{subject}' ({message_id})");
        Ok(Some(message_id))
    }
}
