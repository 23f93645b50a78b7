//! Traffic replay configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `config.toml`
//! - Config resolution (CLI → env → file → defaults)
//! - Semantic validation

pub mod resolve;
pub mod settings;

pub use resolve::{resolve_config, resolve_config_with, CliOverrides, ConfigPaths};
pub use settings::{
    CacheSettings, ConfigError, LogFormat, LoggingSettings, RecorderSettings, ReplaySettings,
    Settings,
};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
