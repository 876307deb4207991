//! Configuration management for PostSync
//!
//! The config file is optional TOML. Every section and field has a default,
//! so a partial file only overrides what it names.
//!
//! ```toml
//! [database]
//! path = "~/.local/share/postsync/postsync.db"
//!
//! [images]
//! output_dir = "~/Pictures/postsync"
//! black_threshold = 30
//! border_tolerance = 2
//! suffix = "_corrected"
//!
//! [platforms]
//! request_timeout_secs = 10
//! enabled = ["x", "tumblr", "threads"]
//!
//! [suggestions]
//! debounce_ms = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::trimmer::{TrimOptions, BLACK_THRESHOLD, BORDER_TOLERANCE, CORRECTED_SUFFIX};
use crate::types::Platform;

pub const CONFIG_ENV: &str = "POSTSYNC_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub images: ImagesConfig,
    pub platforms: PlatformsConfig,
    pub suggestions: SuggestionsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/postsync/postsync.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory for corrected images; unset writes beside the original
    pub output_dir: Option<String>,
    pub black_threshold: u8,
    pub border_tolerance: u32,
    pub suffix: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            black_threshold: BLACK_THRESHOLD,
            border_tolerance: BORDER_TOLERANCE,
            suffix: CORRECTED_SUFFIX.to_string(),
        }
    }
}

impl ImagesConfig {
    pub fn trim_options(&self) -> TrimOptions {
        TrimOptions {
            black_threshold: self.black_threshold,
            border_tolerance: self.border_tolerance,
            suffix: self.suffix.clone(),
            output_dir: self
                .output_dir
                .as_deref()
                .map(|dir| PathBuf::from(shellexpand::tilde(dir).to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub request_timeout_secs: u64,
    /// Platforms eligible for publishing even when a token is stored
    pub enabled: Vec<Platform>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            enabled: Platform::ALL.to_vec(),
        }
    }
}

impl PlatformsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.enabled.contains(&platform)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub debounce_ms: u64,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl SuggestionsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load configuration from the resolved location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load from the resolved location, or defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.images.suffix.is_empty() {
            return Err(ConfigError::MissingField("images.suffix".to_string()).into());
        }
        Ok(())
    }

    /// Database path with `~` expanded
    pub fn db_path(&self) -> String {
        shellexpand::tilde(&self.database.path).to_string()
    }
}

/// `POSTSYNC_CONFIG` if set, otherwise `<config_dir>/postsync/config.toml`
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postsync").join("config.toml"))
}
