//! Transparent proxy supervisor for the Clash engine.
//!
//! Prepares the engine configuration, launches the engine with a minimal
//! set of network capabilities, switches host-level redirection on and off
//! around it, and hot-reloads configuration changes into the running engine.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod proxy_mode;
pub mod reload;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use lifecycle::Shutdown;
pub use supervisor::Supervisor;
