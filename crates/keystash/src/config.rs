//! Keystash configuration
//!
//! Configuration file: ~/.config/keystash/config.yaml
//!
//! ```yaml
//! vault_dir: /home/me/.local/share/keystash
//! primary: account
//! empty_placeholders: false
//! defaults:
//!   kind: generic-password
//!   policy: when-unlocked
//!   sync: false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{AccessibilityPolicy, PrimaryAttribute, SecretKind};

/// Per-deployment behavior of the secret manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerConfig {
    /// Attribute required on add and on every record read back
    pub primary: PrimaryAttribute,
    /// Write `""` for label/service/comment not supplied on add
    pub empty_placeholders: bool,
}

/// Global keystash configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeystashConfig {
    /// Vault root directory; defaults to the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_dir: Option<PathBuf>,

    /// Primary identifying attribute
    #[serde(default)]
    pub primary: PrimaryAttribute,

    /// Write empty placeholders for omitted optional fields on add
    #[serde(default)]
    pub empty_placeholders: bool,

    /// Defaults for new secrets
    #[serde(default)]
    pub defaults: Defaults,
}

/// Defaults applied when the caller does not choose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub kind: SecretKind,

    #[serde(default)]
    pub policy: AccessibilityPolicy,

    /// Synchronize new secrets to remote devices
    #[serde(default)]
    pub sync: bool,
}

/// Default vault root (~/.local/share/keystash)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("keystash")
}

/// Default configuration file (~/.config/keystash/config.yaml)
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("keystash")
        .join("config.yaml")
}

impl KeystashConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_file())
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read keystash config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse keystash config from {:?}", path))?;
            tracing::debug!(?path, "loaded config");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Manager settings derived from this configuration
    pub fn manager(&self) -> ManagerConfig {
        ManagerConfig {
            primary: self.primary,
            empty_placeholders: self.empty_placeholders,
        }
    }

    /// Vault root, falling back to the standard data directory
    pub fn vault_root(&self) -> PathBuf {
        self.vault_dir.clone().unwrap_or_else(default_data_dir)
    }
}
