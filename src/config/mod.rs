//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, or JSON for *.json)
//!     → loader.rs (parse into ConfigFile)
//!     → validation.rs (required fields, ranges, duplicate routes)
//!     → ProxyConfig (validated, immutable)
//!     → store.rs (ConfigHandle, ArcSwap<ProxyConfig>)
//!
//! On file change:
//!     watcher.rs announces it, nothing else
//!
//! On explicit reload (console "reload", SIGHUP):
//!     store.rs re-reads → validates
//!     → atomic swap of Arc<ProxyConfig>, or keep the old one
//!     → only connections routed afterwards observe it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Missing required keys are validation errors, not serde errors
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{BackendTarget, ConfigFile, LogFormat, ProxyConfig, RoutingTable};
pub use store::ConfigHandle;
pub use watcher::ConfigWatcher;
