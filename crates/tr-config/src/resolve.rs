//! Config resolution: CLI → env → file → defaults.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;
use tr_common::Mode;

use crate::settings::{ConfigError, LogFormat, Settings};

/// Path to a config file, overriding discovery.
pub const ENV_CONFIG: &str = "TR_CONFIG";
/// Initial engine mode (`off`, `record`, `replay`).
pub const ENV_MODE: &str = "TR_MODE";
/// Log filter directive.
pub const ENV_LOG: &str = "TR_LOG";
/// Log format (`text`, `json`).
pub const ENV_LOG_FORMAT: &str = "TR_LOG_FORMAT";

/// Command-line overrides, flattened into a host application's parser.
#[derive(Debug, Clone, Default, Args)]
pub struct CliOverrides {
    /// Config file path
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Traffic mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Log filter directive (e.g. `debug`, `tr_core=trace`)
    #[arg(long = "log-level", value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Where to look for the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Used only if it exists; a missing default file means defaults.
    pub default_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// `$XDG_CONFIG_HOME/traffic_replay/config.toml` (or platform equivalent).
    pub fn discover() -> Self {
        Self {
            default_file: dirs::config_dir().map(|d| d.join("traffic_replay").join("config.toml")),
        }
    }
}

/// Resolve settings from the process environment and the discovered config path.
pub fn resolve_config(cli: &CliOverrides) -> Result<Settings, ConfigError> {
    resolve_config_with(cli, &ConfigPaths::discover(), |key| std::env::var(key).ok())
}

/// Resolve settings with an injectable environment lookup.
pub fn resolve_config_with<F>(
    cli: &CliOverrides,
    paths: &ConfigPaths,
    env: F,
) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = cli
        .config
        .clone()
        .or_else(|| env(ENV_CONFIG).filter(|p| !p.is_empty()).map(PathBuf::from));

    let mut settings = match (explicit, &paths.default_file) {
        (Some(path), _) => {
            debug!(path = %path.display(), "loading explicit config");
            Settings::load(&path)?
        }
        (None, Some(path)) if path.exists() => {
            debug!(path = %path.display(), "loading discovered config");
            Settings::load(path)?
        }
        _ => {
            debug!("no config file; using defaults");
            Settings::default()
        }
    };

    if let Some(raw) = env(ENV_MODE) {
        settings.mode = raw.parse().map_err(|reason| ConfigError::Invalid {
            field: ENV_MODE,
            reason,
        })?;
    }
    if let Some(level) = env(ENV_LOG) {
        settings.logging.level = level;
    }
    if let Some(raw) = env(ENV_LOG_FORMAT) {
        settings.logging.format = raw.parse().map_err(|reason| ConfigError::Invalid {
            field: ENV_LOG_FORMAT,
            reason,
        })?;
    }

    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }

    settings.validate()?;
    Ok(settings)
}
