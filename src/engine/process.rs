//! Engine child process.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};

use crate::config::SupervisorConfig;
use crate::engine::privilege::PrivilegeDescriptor;

/// How long to wait for the kernel to reap a killed engine.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while launching the engine.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to prepare privileges for {engine}: {source}")]
    Privileges {
        engine: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {engine}: {source}")]
    Start {
        engine: String,
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur while stopping the engine.
#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("failed to kill engine (pid {pid:?}): {source}")]
    Kill {
        pid: Option<u32>,
        #[source]
        source: io::Error,
    },

    #[error("engine (pid {pid:?}) was not reaped within {timeout:?}")]
    ReapTimeout { pid: Option<u32>, timeout: Duration },
}

/// Paths the engine is launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLaunch {
    pub engine: PathBuf,
    pub config: PathBuf,
    pub home: PathBuf,
    pub ui: PathBuf,
}

impl EngineLaunch {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            engine: config.engine_bin_path(),
            config: config.internal_config_path(),
            home: config.home.clone(),
            ui: config.ui_path(),
        }
    }

    /// Engine arguments: config file, home directory, external UI directory.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-f".into(),
            self.config.clone().into_os_string(),
            "-d".into(),
            self.home.clone().into_os_string(),
            "-ext-ui".into(),
            self.ui.clone().into_os_string(),
        ]
    }
}

/// Handle to a running engine.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
}

impl EngineProcess {
    /// Launch the engine with inherited stdio and the given privileges.
    pub fn spawn(launch: &EngineLaunch, privileges: &PrivilegeDescriptor) -> Result<Self, SpawnError> {
        let engine = launch.engine.display().to_string();

        let mut cmd = Command::new(&launch.engine);
        cmd.args(launch.args())
            .current_dir(&launch.home)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        privileges
            .apply(&mut cmd)
            .map_err(|source| SpawnError::Privileges {
                engine: engine.clone(),
                source,
            })?;

        let capabilities: Vec<&str> = privileges.ambient().iter().map(|c| c.name()).collect();
        tracing::info!(
            engine = %engine,
            args = ?launch.args(),
            capabilities = ?capabilities,
            "Starting engine"
        );

        let child = cmd.spawn().map_err(|source| SpawnError::Start { engine, source })?;
        let pid = child.id();

        tracing::info!(pid = ?pid, "Engine started");
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the engine has already exited.
    pub fn try_exited(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the engine to exit on its own.
    pub async fn wait_exit(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the engine and reap it.
    pub async fn terminate(mut self) -> Result<(), TerminateError> {
        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::info!(pid = ?self.pid, status = %status, "Engine already exited");
            return Ok(());
        }

        self.child.start_kill().map_err(|source| TerminateError::Kill {
            pid: self.pid,
            source,
        })?;

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(pid = ?self.pid, status = %status, "Engine terminated");
                Ok(())
            }
            Ok(Err(source)) => Err(TerminateError::Kill {
                pid: self.pid,
                source,
            }),
            Err(_) => Err(TerminateError::ReapTimeout {
                pid: self.pid,
                timeout: REAP_TIMEOUT,
            }),
        }
    }
}
