//! Handshake-routing TCP proxy library.
//!
//! Reads the first packet of each game client connection, picks a backend
//! by the hostname the client dialed, then relays raw bytes both ways.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod proxy;
pub mod routing;

pub use config::{ConfigHandle, ProxyConfig};
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
