//! Configuration for the vendor HAL bridge.
//!
//! Everything here has a fixed default matching the shipped service; the
//! file/env layers exist for bring-up on boards where the vendor profile is
//! registered under a different id or the log tag must be namespaced.

use crate::error::{Error, Result};
use crate::hal::VENDOR_PROFILE_ID;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Log tag used on the managed-runtime side.
pub const DEFAULT_LOG_TAG: &str = "BluetoothVendorJni";

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Profile id passed to the stack's profile-interface lookup.
    #[serde(default = "default_profile_id")]
    pub profile_id: String,
    /// Tag for the platform logger.
    #[serde(default = "default_log_tag")]
    pub log_tag: String,
}

fn default_profile_id() -> String {
    VENDOR_PROFILE_ID.to_string()
}

fn default_log_tag() -> String {
    DEFAULT_LOG_TAG.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            profile_id: default_profile_id(),
            log_tag: default_log_tag(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the optional file and environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var("BTVENDOR_CONFIG") {
            Ok(path) => Self::load_from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        config.override_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: BridgeConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Override fields from environment variables.
    fn override_from_env(&mut self) {
        if let Ok(id) = env::var("BTVENDOR_PROFILE_ID") {
            self.profile_id = id;
        }
        if let Ok(tag) = env::var("BTVENDOR_LOG_TAG") {
            self.log_tag = tag;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.profile_id.is_empty() {
            return Err(Error::Config("profile_id must not be empty".to_string()));
        }
        if self.log_tag.is_empty() {
            return Err(Error::Config("log_tag must not be empty".to_string()));
        }
        Ok(())
    }
}
