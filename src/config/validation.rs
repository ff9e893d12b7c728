//! Configuration validation.
//!
//! # Responsibilities
//! - Check required fields are present (listen address, port, routes)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect routes that collide once lowercased
//! - Turn a raw `ConfigFile` into an immutable `ProxyConfig`
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ConfigFile → Result<ProxyConfig, Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;

use thiserror::Error;

use crate::config::schema::{
    BackendTarget, ConfigFile, ProxyConfig, RoutingTable, DEFAULT_BACKEND_TIMEOUT_MS,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_SOCKET_TIMEOUT_MS,
};

/// A single semantic problem with a config candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} must not be zero")]
    Zero(&'static str),
    #[error("route {hostname:?}: {reason}")]
    InvalidRoute { hostname: String, reason: String },
    #[error("default_backend: {0}")]
    InvalidDefaultBackend(String),
}

/// Validate `file` and build the config it describes.
pub fn validate_config(file: ConfigFile) -> Result<ProxyConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listen_address = match file.listen_address {
        Some(addr) if !addr.trim().is_empty() => Some(addr.trim().to_string()),
        _ => {
            errors.push(ValidationError::Missing("listen_address"));
            None
        }
    };

    let listen_port = match file.listen_port {
        Some(0) => {
            errors.push(ValidationError::Zero("listen_port"));
            None
        }
        Some(port) => Some(port),
        None => {
            errors.push(ValidationError::Missing("listen_port"));
            None
        }
    };

    let routes = match file.routes {
        Some(routes) => Some(validate_routes(routes, &mut errors)),
        None => {
            errors.push(ValidationError::Missing("routes"));
            None
        }
    };

    if let Some(default) = &file.default_backend {
        if let Some(reason) = target_problem(default) {
            errors.push(ValidationError::InvalidDefaultBackend(reason));
        }
    }

    let socket_timeout_ms = file.socket_timeout_ms.unwrap_or(DEFAULT_SOCKET_TIMEOUT_MS);
    if socket_timeout_ms == 0 {
        errors.push(ValidationError::Zero("socket_timeout_ms"));
    }

    let backend_timeout_ms = file.backend_timeout_ms.unwrap_or(DEFAULT_BACKEND_TIMEOUT_MS);
    if backend_timeout_ms == 0 {
        errors.push(ValidationError::Zero("backend_timeout_ms"));
    }

    let max_connections = file.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
    if max_connections == 0 {
        errors.push(ValidationError::Zero("max_connections"));
    }

    match (listen_address, listen_port, routes) {
        (Some(listen_address), Some(listen_port), Some(routes)) if errors.is_empty() => {
            Ok(ProxyConfig {
                listen_address,
                listen_port,
                socket_timeout_ms,
                backend_timeout_ms,
                allow_fallback: file.allow_fallback,
                default_backend: file.default_backend,
                routes,
                max_connections,
                log_level: file.log_level.unwrap_or_else(|| "info".to_string()),
                log_format: file.log_format.unwrap_or_default(),
            })
        }
        _ => Err(errors),
    }
}

fn validate_routes(
    routes: HashMap<String, BackendTarget>,
    errors: &mut Vec<ValidationError>,
) -> RoutingTable {
    let mut seen: HashMap<String, String> = HashMap::with_capacity(routes.len());

    for (hostname, target) in &routes {
        if hostname.is_empty() {
            errors.push(ValidationError::InvalidRoute {
                hostname: hostname.clone(),
                reason: "empty hostname".to_string(),
            });
        }
        if let Some(reason) = target_problem(target) {
            errors.push(ValidationError::InvalidRoute {
                hostname: hostname.clone(),
                reason,
            });
        }
        if let Some(previous) = seen.insert(hostname.to_ascii_lowercase(), hostname.clone()) {
            errors.push(ValidationError::InvalidRoute {
                hostname: hostname.clone(),
                reason: format!("duplicates {:?} ignoring case", previous),
            });
        }
    }

    RoutingTable::new(routes)
}

fn target_problem(target: &BackendTarget) -> Option<String> {
    if target.host.trim().is_empty() {
        Some("backend host is empty".to_string())
    } else if target.port == 0 {
        Some("backend port must not be zero".to_string())
    } else {
        None
    }
}
