//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! ParsedHandshake.hostname
//!     → router.rs (lowercase, exact lookup in the config snapshot)
//!     → Exact target | Fallback target | AddressNotAllowed
//! ```
//!
//! # Design Decisions
//! - The snapshot is read once per connection, at resolution time
//! - The decision is frozen for the connection's lifetime
//! - O(1) host lookup via HashMap

pub mod router;

pub use router::{resolve, Resolved, RouteKind, RoutingError};
