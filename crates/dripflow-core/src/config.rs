//! Dripflow configuration system.
//!
//! TOML file under `~/.dripflow/config.toml`. The `[email]` section only
//! seeds the store's settings row on first open — the live values are
//! re-read from the store every dispatch pass so credentials can be
//! rotated without a restart.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DripflowConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub email: EmailSeedConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl DripflowConfig {
    /// Load config from the default path (~/.dripflow/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::DripflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::DripflowError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DripflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Dripflow home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dripflow")
    }

    /// Resolve the SQLite database path (config override or default).
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("dripflow.db"))
    }
}

/// Poller and immediate-dispatch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Wall-clock interval between due scans, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Max due entries pulled per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Entries scheduled within this many seconds of enrollment are
    /// eligible for out-of-band immediate dispatch.
    #[serde(default = "default_immediate_window_secs")]
    pub immediate_window_secs: i64,
}

fn default_interval_secs() -> u64 { 30 }
fn default_batch_size() -> u32 { 100 }
fn default_immediate_window_secs() -> i64 { 60 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            immediate_window_secs: default_immediate_window_secs(),
        }
    }
}

/// HTTP gateway binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8460 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Seed values for the store's settings row. Applied once on first open;
/// thereafter the store row is authoritative and editable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSeedConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_provider() -> String { "none".into() }
fn default_from_email() -> String { "no-reply@dripflow.io".into() }
fn default_from_name() -> String { "Dripflow".into() }

impl Default for EmailSeedConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

/// SMTP relay settings, used only when the configured provider is "smtp".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_smtp_port() -> u16 { 587 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}
