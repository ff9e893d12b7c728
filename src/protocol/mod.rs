//! Handshake protocol subsystem.
//!
//! # Data Flow
//! ```text
//! client bytes (any chunking)
//!     → handshake.rs (accumulate, decode first frame)
//!         → varint.rs (length, packet id, protocol, address length)
//!     → ParsedHandshake { hostname, buffered }
//! ```
//!
//! # Design Decisions
//! - Sniffing is one-shot: nothing after the handshake is interpreted
//! - Incomplete input is never an error, only a reason to wait
//! - The length prefix caps how much a client can make us buffer
//! - Hostname charset is a byte-class scan, no regex

pub mod handshake;
pub mod varint;

pub use handshake::{Feed, HandshakeParser, ParseProgress, ParsedHandshake, ProtocolError};
pub use varint::VarIntError;
