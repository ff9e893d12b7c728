//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Bind listener → Start watcher/console
//!
//! Control (console.rs, signals.rs):
//!     "reload" / SIGHUP → ConfigHandle::reload
//!     "config"          → log active config
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → stop accepting → stop watcher → close console channel → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Reload is always an explicit operator action
//! - Shutdown does not drain or sever running relays

pub mod console;
pub mod shutdown;
pub mod signals;

pub use console::ControlCommand;
pub use shutdown::Shutdown;
pub use signals::{SignalEvent, SignalListener};
