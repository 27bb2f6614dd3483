//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGHUP → trigger the shared Shutdown token
//!
//! Startup (startup.rs):
//!     First config → Validate → Persist → Spawn engine → Enable redirection
//!
//! Shutdown (shutdown.rs):
//!     Token cancelled → Disable redirection → Terminate engine → Stopped
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing is redirected before the engine is running
//! - Ordered shutdown: redirection is removed before the engine is killed
//! - Shutdown is best-effort: a failed step is logged and the next one runs

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownOrchestrator, ShutdownPhase, ShutdownReport};
pub use signals::{SignalListener, TerminationSignal};
pub use startup::{ProxyState, Started};
