//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: connection_id, peer_addr, hostname, backend)
//!     → logging.rs subscriber (stdout, pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Every connection runs inside a `connection` span
//! - Level encodes the failure category: client/route/timeout at warn,
//!   backend connect and socket errors at error

pub mod logging;

pub use logging::init_logging;
