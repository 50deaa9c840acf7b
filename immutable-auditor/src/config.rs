//! Configuration management
//!
//! Handles:
//! - Process timeouts (start + completion deadlines)
//! - View preferences (expand state preservation, watch interval)
//! - OS-specific storage, overridable through `IMMUTABLE_AUDITOR_CONFIG`

use auditor_core::Timeouts;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_ENV: &str = "IMMUTABLE_AUDITOR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    pub timeouts: TimeoutConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub start_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub preserve_expanded: bool,
    pub watch_interval_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let defaults = Timeouts::default();
        Self {
            start_ms: defaults.start.as_millis() as u64,
            total_ms: defaults.total.as_millis() as u64,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            preserve_expanded: true,
            watch_interval_secs: 30,
        }
    }
}

impl AuditorConfig {
    /// Load from `path`, or from the default location. A missing file means defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        let config: AuditorConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to `path`, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    /// `$IMMUTABLE_AUDITOR_CONFIG`, else the OS config dir
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("immutable-auditor");
        path.push("config.toml");
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.start_ms == 0 || self.timeouts.total_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        if self.view.watch_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "watch_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn process_timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.timeouts.start_ms, self.timeouts.total_ms)
    }
}
