//! Ambient configuration-loading traits shared by every binary in the
//! workspace.
//!
//! The traffic-controller-specific schema (phases, rings, barriers, inputs)
//! lives in [`tsc_core::config`]; this module only provides the generic TOML
//! loading machinery and the log-level type every crate's CLI shares.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration (mirrors `tracing::Level` without pulling it
/// into the wire-format dependency graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Error type for generic TOML configuration loading.
///
/// Schema-specific validation errors (ring/barrier partition mismatches,
/// duplicate phase ids, etc.) are reported through
/// `tsc_core::config::ConfigError` instead; this variant set only covers
/// file access and syntax.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found")]
    FileNotFound,

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Fields shared by every program's CLI-facing configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    pub service_name: String,
}

/// Loads configuration from a TOML file, with a blanket implementation for
/// any `serde::de::DeserializeOwned` type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("unknown field") {
                ConfigError::UnknownField(msg)
            } else {
                ConfigError::ParseError(msg)
            }
        })
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
