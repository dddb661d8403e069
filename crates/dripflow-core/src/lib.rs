//! # Dripflow Core
//!
//! Shared foundation for the Dripflow delivery engine: domain types,
//! configuration, and the error taxonomy used across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::DripflowConfig;
pub use error::{DripflowError, Result};
