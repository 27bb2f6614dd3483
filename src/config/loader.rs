//! Supervisor settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SupervisorConfig;

/// Error type for supervisor settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("check interval {secs}s is too short, must be at least {min}s")]
    IntervalTooShort { secs: u64, min: u64 },

    #[error("invalid config source '{source_str}': {reason}")]
    Source { source_str: String, reason: String },

    #[error("invalid http header '{0}', expected key=value")]
    Header(String),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Load supervisor settings from a TOML file.
///
/// Missing keys fall back to their defaults. The result is not validated;
/// callers validate after command-line overrides are applied.
pub fn load_settings(path: &Path) -> Result<SupervisorConfig, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: SupervisorConfig = toml::from_str(&content)?;
    Ok(config)
}
