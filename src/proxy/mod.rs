//! Proxy pipeline.
//!
//! # Data Flow
//! ```text
//! server.rs (accept, spawn per connection)
//!     → session.rs (state machine)
//!         → protocol::HandshakeParser   (awaiting data / parsed / failed)
//!         → routing::resolve            (snapshot read once)
//!         → relay.rs                    (connect, replay, full duplex copy)
//!     → error.rs (categorized close)
//! ```
//!
//! # Design Decisions
//! - One task per connection; nothing shared but the config snapshot
//! - Any failure resolves to "close this pair", never a process fault
//! - Nothing is retried

pub mod error;
pub mod relay;
pub mod server;
pub mod session;

pub use error::{Leg, ProxyError};
pub use relay::{RelayEnd, RelayStats};
pub use server::ProxyServer;
pub use session::{Session, SessionEnd, SessionOutcome, SessionState};
