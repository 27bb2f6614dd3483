//! Observability subsystem.
//!
//! Every subsystem logs its state transitions through `tracing` with
//! structured fields; `logging.rs` installs the subscriber that prints them.

pub mod logging;
