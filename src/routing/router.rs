//! Hostname → backend resolution.
//!
//! # Responsibilities
//! - Look up the lowercased hostname in the routing table
//! - Fall back to the default backend when allowed
//! - Return an explicit error otherwise
//!
//! # Design Decisions
//! - Exact match only: no wildcards, no partial matches
//! - Stateless: the caller passes the snapshot it read
//! - Explicit AddressNotAllowed rather than silent default

use thiserror::Error;

use crate::config::{BackendTarget, ProxyConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("address not allowed: {0}")]
    AddressNotAllowed(String),
}

/// How a target was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Exact,
    Fallback,
}

/// Routing decision for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub target: BackendTarget,
    pub kind: RouteKind,
}

/// Resolve `hostname` against `config`.
pub fn resolve(hostname: &str, config: &ProxyConfig) -> Result<Resolved, RoutingError> {
    let key = hostname.to_ascii_lowercase();

    if let Some(target) = config.routes.get(&key) {
        return Ok(Resolved {
            target: target.clone(),
            kind: RouteKind::Exact,
        });
    }

    match (&config.default_backend, config.allow_fallback) {
        (Some(default), true) => Ok(Resolved {
            target: default.clone(),
            kind: RouteKind::Fallback,
        }),
        _ => Err(RoutingError::AddressNotAllowed(hostname.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingTable;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::new("0.0.0.0", 25565);
        config.routes = RoutingTable::new([("example.com", BackendTarget::new("10.0.0.1", 25565))]);
        config
    }

    #[test]
    fn lookup_ignores_case() {
        let config = config();
        let lower = resolve("example.com", &config).unwrap();
        let mixed = resolve("Example.com", &config).unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower.target, BackendTarget::new("10.0.0.1", 25565));
        assert_eq!(lower.kind, RouteKind::Exact);
    }

    #[test]
    fn unknown_without_fallback_is_rejected() {
        let mut config = config();
        config.default_backend = Some(BackendTarget::new("10.0.0.9", 25565));
        assert_eq!(
            resolve("other.com", &config),
            Err(RoutingError::AddressNotAllowed("other.com".into()))
        );
    }

    #[test]
    fn unknown_with_fallback_uses_default() {
        let mut config = config();
        config.allow_fallback = true;
        config.default_backend = Some(BackendTarget::new("10.0.0.9", 25565));

        let resolved = resolve("other.com", &config).unwrap();
        assert_eq!(resolved.target, BackendTarget::new("10.0.0.9", 25565));
        assert_eq!(resolved.kind, RouteKind::Fallback);
    }

    #[test]
    fn fallback_without_default_is_rejected() {
        let mut config = config();
        config.allow_fallback = true;
        assert!(resolve("other.com", &config).is_err());
    }

    #[test]
    fn no_partial_matches() {
        let config = config();
        assert!(resolve("sub.example.com", &config).is_err());
        assert!(resolve("example.co", &config).is_err());
        assert!(resolve("example.com.", &config).is_err());
    }
}
