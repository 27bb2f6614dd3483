//! Host-level transparent redirection.
//!
//! The supervisor only drives redirection through the [`ProxyMode`]
//! capability: enable once after the engine is up, disable once before the
//! engine is killed. How the rules are installed is up to the
//! implementation; [`HookProxyMode`] delegates to operator-supplied commands.

pub mod hook;

use std::future::Future;

use thiserror::Error;

pub use hook::HookProxyMode;

/// Errors that can occur while switching redirection.
#[derive(Debug, Error)]
pub enum ProxyModeError {
    #[error("failed to run {hook} hook '{program}': {source}")]
    Spawn {
        hook: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{hook} hook '{program}' exited with {status}")]
    HookFailed {
        hook: &'static str,
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("{hook} hook '{program}' timed out after {secs}s")]
    Timeout {
        hook: &'static str,
        program: String,
        secs: u64,
    },
}

/// Enable/disable capability for host-level traffic redirection.
pub trait ProxyMode: Send + Sync {
    /// Install redirection rules pointing at the engine.
    fn enable(&self) -> impl Future<Output = Result<(), ProxyModeError>> + Send;

    /// Remove the redirection rules.
    fn disable(&self) -> impl Future<Output = Result<(), ProxyModeError>> + Send;
}
