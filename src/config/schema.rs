//! Supervisor settings schema.
//!
//! This module defines the settings the supervisor itself runs with. All
//! types derive Serde traits so they can be loaded from a TOML settings
//! file before command-line overrides are applied.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::loader::SettingsError;
use crate::config::source::{parse_headers, ConfigSource};

/// File name of the engine binary inside the home directory.
pub const INTERNAL_ENGINE_BIN_NAME: &str = "xclash";

/// File name the accepted engine configuration is persisted under.
pub const INTERNAL_CONFIG_NAME: &str = "xclash.yaml";

/// Lower bound for the config check interval.
pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;

/// Root settings for the supervisor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Installation home directory (engine binary, UI assets, persisted config).
    pub home: PathBuf,

    /// Engine configuration source: local path or http(s) URL.
    pub config: String,

    /// Dashboard asset directory name under `home`.
    pub ui: String,

    /// Seconds between configuration re-fetches.
    pub check_interval_secs: u64,

    /// Extra headers (`key=value`) sent when fetching a remote config.
    pub http_headers: Vec<String>,

    /// Enable debug logging.
    pub debug: bool,

    /// Skip asset extraction; assets must already be installed in `home`.
    pub disable_extract: bool,

    /// Deadline for a single config fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Deadline for a single control-plane call, in seconds.
    pub control_timeout_secs: u64,

    /// Transparent redirection hooks.
    pub proxy_mode: ProxyModeConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from("/data/clash"),
            config: "/etc/clash.yaml".to_string(),
            ui: "yacd".to_string(),
            check_interval_secs: 120,
            http_headers: Vec::new(),
            debug: false,
            disable_extract: false,
            fetch_timeout_secs: 30,
            control_timeout_secs: 10,
            proxy_mode: ProxyModeConfig::default(),
        }
    }
}

/// Commands that install and remove host-level redirection.
///
/// Each entry is an argv vector; the first element is the program.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyModeConfig {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

impl SupervisorConfig {
    /// Check ranges and parse the derived values once, before anything starts.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.check_interval_secs < MIN_CHECK_INTERVAL_SECS {
            return Err(SettingsError::IntervalTooShort {
                secs: self.check_interval_secs,
                min: MIN_CHECK_INTERVAL_SECS,
            });
        }
        if self.fetch_timeout_secs == 0 || self.control_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.ui.trim().is_empty() {
            return Err(SettingsError::Invalid("ui must not be empty".to_string()));
        }
        self.source()?;
        self.headers()?;
        Ok(())
    }

    /// The parsed configuration source.
    pub fn source(&self) -> Result<ConfigSource, SettingsError> {
        ConfigSource::parse(&self.config)
    }

    /// The parsed extra request headers.
    pub fn headers(&self) -> Result<Vec<(String, String)>, SettingsError> {
        parse_headers(&self.http_headers)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    /// Path the accepted engine configuration is written to.
    pub fn internal_config_path(&self) -> PathBuf {
        self.home.join(INTERNAL_CONFIG_NAME)
    }

    pub fn engine_bin_path(&self) -> PathBuf {
        self.home.join(INTERNAL_ENGINE_BIN_NAME)
    }

    pub fn ui_path(&self) -> PathBuf {
        self.home.join(&self.ui)
    }
}
