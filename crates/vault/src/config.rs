//! Client configuration.
//!
//! Stored as JSON at `~/.config/coldstash/config.json`. Missing fields take
//! their defaults; an unreadable file is reported and replaced by defaults.

use std::path::{Path, PathBuf};

use coldstash_protocol::RetrievalTier;
use coldstash_transfer::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdstashConfig {
    /// Account the vaults belong to. `-` means the caller's own account.
    pub account_id: String,

    pub region: String,

    /// Part size for new uploads and chunk size for downloads, in bytes.
    pub chunk_size: u64,

    /// Root directory of the local vault backend.
    pub local_root: PathBuf,

    /// Tier requested for archive retrievals.
    pub retrieval_tier: RetrievalTier,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ColdstashConfig {
    fn default() -> Self {
        Self {
            account_id: "-".into(),
            region: "local".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            local_root: data_base_dir().join("coldstash").join("vaults"),
            retrieval_tier: RetrievalTier::default(),
            log_filter: "info,coldstash=debug".into(),
        }
    }
}

impl ColdstashConfig {
    /// Loads the configuration from the default location.
    pub fn load() -> Result<Self, VaultError> {
        Self::load_from(&default_config_path())
    }

    /// Loads the configuration from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Result<Self, VaultError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = match serde_json::from_str::<Self>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to the default location.
    pub fn save(&self) -> Result<(), VaultError> {
        self.save_to(&default_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), VaultError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.chunk_size == 0 {
            return Err(VaultError::Config("chunk_size must be greater than zero".into()));
        }
        if self.account_id.is_empty() {
            return Err(VaultError::Config("account_id must not be empty".into()));
        }
        Ok(())
    }
}

/// `~/.config/coldstash/config.json` on Linux.
pub fn default_config_path() -> PathBuf {
    config_base_dir().join("coldstash").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}

fn data_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        config_base_dir()
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".local").join("share")
    }
}
