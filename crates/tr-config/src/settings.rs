//! Configuration types.
//!
//! Every section is optional in the file; missing fields take the defaults
//! below.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tr_common::Mode;

use crate::CONFIG_SCHEMA_VERSION;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config schema version {found} is not compatible (expected {expected})")]
    IncompatibleSchema { found: String, expected: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for tr_common::Error {
    fn from(err: ConfigError) -> Self {
        tr_common::Error::Config(err.to_string())
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schema_version: String,

    /// Initial engine mode.
    pub mode: Mode,

    pub logging: LoggingSettings,

    pub recorder: RecorderSettings,

    pub replay: ReplaySettings,

    pub cache: CacheSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            mode: Mode::Off,
            logging: LoggingSettings::default(),
            recorder: RecorderSettings::default(),
            replay: ReplaySettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `tr_core=debug,warn`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Run the protocol's flatteners on every captured payload so that
    /// unparseable traffic is rejected at capture time rather than at replay.
    pub validate_payloads: bool,

    /// Upper bound on sessions that are open (started, not yet finalized).
    pub max_pending_sessions: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            validate_payloads: true,
            max_pending_sessions: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Attach the closest recorded request to `ActionNotFound` errors.
    pub near_miss_diagnostics: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            near_miss_diagnostics: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL applied by `LocalCache::store` when none is given. `None` = no expiry.
    pub default_ttl_secs: Option<u64>,
}

impl Settings {
    /// Parse settings from TOML text. `origin` is only used in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if major(&self.schema_version) != major(CONFIG_SCHEMA_VERSION) {
            return Err(ConfigError::IncompatibleSchema {
                found: self.schema_version.clone(),
                expected: CONFIG_SCHEMA_VERSION.to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                reason: "must not be empty".to_string(),
            });
        }
        if self.recorder.max_pending_sessions == 0 {
            return Err(ConfigError::Invalid {
                field: "recorder.max_pending_sessions",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache.default_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "cache.default_ttl_secs",
                reason: "use no value instead of 0 to disable expiry".to_string(),
            });
        }
        Ok(())
    }
}

fn major(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|s| s.parse().ok())
}
