//! Redirection driven by external commands.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::SupervisorConfig;
use crate::proxy_mode::{ProxyMode, ProxyModeError};

/// Deadline for a single hook run.
const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs an enable and a disable command, each an argv vector.
///
/// Hooks see `TPCLASH_HOME` and `TPCLASH_CONFIG` in their environment.
/// An empty hook is a no-op.
#[derive(Debug, Clone, Default)]
pub struct HookProxyMode {
    enable: Vec<String>,
    disable: Vec<String>,
    env: Vec<(String, String)>,
}

impl HookProxyMode {
    pub fn new(enable: Vec<String>, disable: Vec<String>) -> Self {
        Self {
            enable,
            disable,
            env: Vec::new(),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            config.proxy_mode.enable.clone(),
            config.proxy_mode.disable.clone(),
        )
        .with_paths(&config.home, &config.internal_config_path())
    }

    fn with_paths(mut self, home: &Path, config: &Path) -> Self {
        self.env = vec![
            ("TPCLASH_HOME".to_string(), home.display().to_string()),
            ("TPCLASH_CONFIG".to_string(), config.display().to_string()),
        ];
        self
    }

    async fn run_hook(&self, hook: &'static str, argv: &[String]) -> Result<(), ProxyModeError> {
        let Some((program, args)) = argv.split_first() else {
            tracing::warn!(hook, "No redirection hook configured, skipping");
            return Ok(());
        };

        tracing::info!(hook, program = %program, args = ?args, "Running redirection hook");

        let mut child = Command::new(program)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProxyModeError::Spawn {
                hook,
                program: program.clone(),
                source,
            })?;

        let status = match tokio::time::timeout(HOOK_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ProxyModeError::Spawn {
                    hook,
                    program: program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProxyModeError::Timeout {
                    hook,
                    program: program.clone(),
                    secs: HOOK_TIMEOUT.as_secs(),
                })
            }
        };

        if !status.success() {
            return Err(ProxyModeError::HookFailed {
                hook,
                program: program.clone(),
                status,
            });
        }
        Ok(())
    }
}

impl ProxyMode for HookProxyMode {
    async fn enable(&self) -> Result<(), ProxyModeError> {
        self.run_hook("enable", &self.enable).await
    }

    async fn disable(&self) -> Result<(), ProxyModeError> {
        self.run_hook("disable", &self.disable).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn test_empty_hooks_are_noops() {
        let mode = HookProxyMode::default();
        assert!(mode.enable().await.is_ok());
        assert!(mode.disable().await.is_ok());
    }

    #[tokio::test]
    async fn test_hook_env_and_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("enabled");
        let config = SupervisorConfig {
            home: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut mode = HookProxyMode::from_config(&config);
        mode.enable = sh(&format!("echo \"$TPCLASH_CONFIG\" > {}", marker.display()));

        mode.enable().await.unwrap();
        let recorded = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(recorded.trim(), config.internal_config_path().display().to_string());
    }

    #[tokio::test]
    async fn test_failing_hook() {
        let mode = HookProxyMode::new(Vec::new(), sh("exit 4"));
        let err = mode.disable().await.unwrap_err();
        assert!(matches!(err, ProxyModeError::HookFailed { hook: "disable", .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let mode = HookProxyMode::new(vec!["/nonexistent/tproxy-up".into()], Vec::new());
        assert!(matches!(
            mode.enable().await,
            Err(ProxyModeError::Spawn { .. })
        ));
    }
}
