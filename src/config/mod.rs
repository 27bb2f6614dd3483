//! Configuration management subsystem.
//!
//! Two kinds of configuration live here: the supervisor's own settings,
//! and the engine configuration it watches and hands to the engine.
//!
//! # Data Flow
//! ```text
//! settings file (TOML) + CLI flags
//!     → loader.rs / schema.rs
//!     → SupervisorConfig (validated, immutable)
//!
//! engine config source (local path or URL)
//!     → source.rs (fetch one snapshot)
//!     → watcher.rs (first snapshot inline, then every interval)
//!     → validation.rs (+ autofix.rs on failure)
//!     → store.rs (persist where the engine reads it)
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded and passed explicitly, no globals
//! - All settings have defaults to allow a bare command line
//! - Validation separates syntactic (serde) from semantic checks

pub mod autofix;
pub mod loader;
pub mod schema;
pub mod source;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::SettingsError;
pub use schema::{ProxyModeConfig, SupervisorConfig};
pub use source::{ConfigFetcher, ConfigSource, ConfigText, FetchError};
pub use validation::{ControlAddress, ParsedConfig, ValidatedConfig, ValidationError};
pub use watcher::{ConfigWatcher, UpdateReceiver};
