//! Configuration file
//!
//! A single JSON document with one section per concern. Every field has a
//! default, so a partial file (or none at all) is valid. When no file exists
//! at the requested path the defaults are written there on first load.

use condor_core::model::MAX_DATAGRAM_SIZE;
use condor_core::{ConversionSettings, NetworkConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR: &str = ".condor-relay";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`, or a full filter directive
    pub level: String,
    pub log_to_file: bool,
    pub log_file_path: Option<PathBuf>,
    /// Rotated files kept on disk
    pub max_log_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file_path: None,
            max_log_files: 5,
        }
    }
}

/// HTTP control API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 9100,
        }
    }
}

/// How [`AppConfig::load_or_create`] obtained its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from an existing file
    Loaded,
    /// No file existed; defaults were written
    Created,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub conversions: ConversionSettings,
    pub logging: LogSettings,
    pub api: ApiSettings,
}

/// `~/.condor-relay/config.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .ok_or(ConfigError::NoHomeDir)
}

impl AppConfig {
    /// Load from `path`, writing the defaults there if the file does not exist.
    ///
    /// Runs before logging is installed, so the caller reports the origin.
    pub fn load_or_create(path: &Path) -> Result<(Self, ConfigOrigin), ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok((config, ConfigOrigin::Created));
        }

        Ok((Self::load(path)?, ConfigOrigin::Loaded))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = network_problems(&self.network);

        if self.logging.log_to_file && self.logging.log_file_path.is_none() {
            problems.push("log file path must be set when logging to file".to_string());
        }
        if self.logging.max_log_files == 0 {
            problems.push("max_log_files must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

/// Problems with a network config, empty when it is usable
pub fn network_problems(network: &NetworkConfig) -> Vec<String> {
    let mut problems = Vec::new();
    if network.input_port == 0 {
        problems.push("input port must be between 1 and 65535".to_string());
    }
    if network.output_port == 0 {
        problems.push("output port must be between 1 and 65535".to_string());
    }
    if network.input_port == network.output_port {
        problems.push("input and output ports cannot be the same".to_string());
    }
    if network.output_host.trim().is_empty() {
        problems.push("output host cannot be empty".to_string());
    }
    if network.bind_host.trim().is_empty() {
        problems.push("bind host cannot be empty".to_string());
    }
    if !(1..=MAX_DATAGRAM_SIZE).contains(&network.buffer_size) {
        problems.push(format!(
            "buffer size must be between 1 and {} bytes",
            MAX_DATAGRAM_SIZE
        ));
    }
    problems
}
