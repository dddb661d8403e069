//! Dripflow error taxonomy.
//!
//! Configuration and provider errors surface as `failed` queue entries,
//! never as panics on the enrollment path.

use thiserror::Error;

/// All errors produced by Dripflow crates.
#[derive(Error, Debug)]
pub enum DripflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Provider error: {0}")]
    Provider(String),

    /// Delivery is disabled — provider identifier is "none" or empty.
    #[error("Email provider not configured")]
    ProviderNotConfigured,

    #[error("Unknown email provider: {0}")]
    ProviderNotFound(String),

    /// Credentials missing for a real provider — fail fast, no network call.
    #[error("Missing API key for provider: {0}")]
    ApiKeyMissing(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, DripflowError>;
