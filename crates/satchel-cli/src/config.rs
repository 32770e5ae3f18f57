//! CLI configuration — TOML file plus environment overrides.
//!
//! Priority: environment variables > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use satchel_notify::smtp::SmtpConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub storage: StorageSection,

    /// SMTP settings; verification emails fail with a clear error when
    /// absent.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory for the vault database, key file, and audit log.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".satchel"))
        .unwrap_or_else(|| PathBuf::from(".satchel"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config: {}", p.display()))?;
                toml::from_str(&contents).context("failed to parse TOML config")?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Supported env vars: `SATCHEL_DATA_DIR`, `SATCHEL_LOG_LEVEL`,
    /// `SATCHEL_SMTP_PASSWORD`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SATCHEL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SATCHEL_LOG_LEVEL") {
            self.storage.log_level = v;
        }
        if let Ok(v) = std::env::var("SATCHEL_SMTP_PASSWORD") {
            if let Some(smtp) = &mut self.smtp {
                smtp.password = v;
            }
        }
    }

    pub fn vault_path(&self) -> PathBuf {
        self.storage.data_dir.join("vault.db")
    }

    pub fn key_path(&self) -> PathBuf {
        self.storage.data_dir.join("vault.key")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.storage.data_dir.join("audit.log")
    }
}
