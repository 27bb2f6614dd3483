//! Proxy engine subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     EngineLaunch (paths from settings) + PrivilegeDescriptor
//!     → process.rs spawns the engine with ambient capabilities
//!
//! Steady state:
//!     reload coordinator → control.rs → PUT /configs on the engine
//!
//! Shutdown:
//!     orchestrator → process.rs kills and reaps the engine
//! ```

pub mod control;
pub mod privilege;
pub mod process;

pub use control::{ControlClient, ControlError};
pub use privilege::{Capability, PrivilegeDescriptor, ENGINE_CAPABILITIES};
pub use process::{EngineLaunch, EngineProcess, SpawnError, TerminateError};
