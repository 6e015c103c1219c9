//! User configuration (`config.toml`).
//!
//! ```toml
//! [timeline]
//! steps_per_pattern = 16
//! default_pattern_length_bars = 2
//! default_velocity = 100
//!
//! [storage]
//! path = "/home/me/music/timeline.json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 9124
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use quill_timeline::TimelineConfig;

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "quillmusic";

/// Default server bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 9124;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub timeline: TimelineConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// Where the timeline snapshot lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file; defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// WebSocket server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl QuillConfig {
    /// Platform location of `config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Loads configuration.
    ///
    /// An explicit path must exist. Without one, the platform default is read
    /// if present and defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => {
                log::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reads and validates a config file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.timeline.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolves the snapshot path: command-line override, then
    /// `[storage] path`, then the platform data directory.
    pub fn snapshot_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.storage.path {
            return Ok(path.clone());
        }
        match dirs::data_dir() {
            Some(dir) => Ok(dir.join(APP_DIR).join("timeline.json")),
            None => bail!("no data directory on this platform; pass --store <path>"),
        }
    }
}
