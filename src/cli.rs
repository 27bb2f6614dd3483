//! Command-line interface.
//!
//! Flags override the settings file, which overrides the built-in defaults.
//! A flag that is not given leaves the lower layer untouched.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_settings, SettingsError};
use crate::config::SupervisorConfig;

#[derive(Debug, Parser)]
#[command(name = "tpclash")]
#[command(about = "Transparent proxy supervisor for Clash", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug log
    #[arg(long)]
    pub debug: bool,

    /// Clash home dir
    #[arg(short = 'd', long)]
    pub home: Option<PathBuf>,

    /// Clash config local path or remote url
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Clash dashboard directory name under home (official|yacd)
    #[arg(short = 'u', long)]
    pub ui: Option<String>,

    /// Remote config check interval (e.g. 120, 90s, 2m, 1h)
    #[arg(short = 'i', long, value_parser = parse_duration_secs)]
    pub check_interval: Option<u64>,

    /// Http header when requesting a remote config (key=value)
    #[arg(long = "http-header", value_delimiter = ',')]
    pub http_headers: Vec<String>,

    /// Disable extract files
    #[arg(long)]
    pub disable_extract: bool,

    /// Command that enables transparent redirection
    #[arg(long)]
    pub enable_hook: Option<String>,

    /// Command that disables transparent redirection
    #[arg(long)]
    pub disable_hook: Option<String>,

    /// Deadline for fetching the config, in seconds
    #[arg(long)]
    pub fetch_timeout: Option<u64>,

    /// Deadline for engine control calls, in seconds
    #[arg(long)]
    pub control_timeout: Option<u64>,

    /// Supervisor settings file (TOML)
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl Cli {
    /// Build and validate the supervisor settings.
    pub fn load(self) -> Result<SupervisorConfig, SettingsError> {
        let config = self.into_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the supervisor settings: defaults, then file, then flags.
    pub fn into_config(self) -> Result<SupervisorConfig, SettingsError> {
        let mut config = match &self.settings {
            Some(path) => load_settings(path)?,
            None => SupervisorConfig::default(),
        };

        if self.debug {
            config.debug = true;
        }
        if let Some(home) = self.home {
            config.home = home;
        }
        if let Some(source) = self.config {
            config.config = source;
        }
        if let Some(ui) = self.ui {
            config.ui = ui;
        }
        if let Some(secs) = self.check_interval {
            config.check_interval_secs = secs;
        }
        if !self.http_headers.is_empty() {
            config.http_headers = self.http_headers;
        }
        if self.disable_extract {
            config.disable_extract = true;
        }
        if let Some(hook) = self.enable_hook {
            config.proxy_mode.enable = split_command(&hook);
        }
        if let Some(hook) = self.disable_hook {
            config.proxy_mode.disable = split_command(&hook);
        }
        if let Some(secs) = self.fetch_timeout {
            config.fetch_timeout_secs = secs;
        }
        if let Some(secs) = self.control_timeout {
            config.control_timeout_secs = secs;
        }

        Ok(config)
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Parse `120`, `90s`, `2m` or `1h` into seconds.
fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(format!("invalid duration unit in '{s}', use s, m or h")),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
