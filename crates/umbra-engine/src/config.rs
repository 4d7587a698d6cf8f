//! Engine configuration (umbra.toml)
//!
//! ```toml
//! class-prefix = "umbra.generated"
//! write-policy = "local-only"
//! refresh-after-wrap = true
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::WritePolicy;

/// Default package prefix for synthesized class names
pub const DEFAULT_CLASS_PREFIX: &str = "umbra.generated";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Mirroring engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MirrorConfig {
    /// Package prefix of qualified class names
    pub class_prefix: String,

    /// Initial write policy of the session manager's switch
    pub write_policy: WritePolicy,

    /// Run the refresh pass right after every wrap
    pub refresh_after_wrap: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            class_prefix: DEFAULT_CLASS_PREFIX.to_string(),
            write_policy: WritePolicy::Push,
            refresh_after_wrap: true,
        }
    }
}

impl MirrorConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MirrorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class_prefix.is_empty() {
            return Err(ConfigError::Invalid("class-prefix cannot be empty".to_string()));
        }
        if self.class_prefix.starts_with('.') || self.class_prefix.ends_with('.') {
            return Err(ConfigError::Invalid(format!(
                "class-prefix '{}' cannot start or end with '.'",
                self.class_prefix
            )));
        }
        Ok(())
    }
}
