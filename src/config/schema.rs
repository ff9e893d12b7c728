//! Configuration schema definitions.
//!
//! Two layers:
//! - `ConfigFile`: what the file literally says. Every field optional so a
//!   missing key is reported by validation instead of failing inside serde.
//! - `ProxyConfig`: the validated, immutable snapshot connections read.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pre-handshake idle timeout for the client leg.
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 10_000;

/// Default idle timeout for the backend leg (connect + relay).
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 30_000;

/// Default cap on concurrently handled client connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// A backend game server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BackendTarget {
    pub host: String,
    pub port: u16,
}

impl BackendTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Lowercased hostname → backend.
///
/// Built once per config and never mutated; a reload builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<String, BackendTarget>,
}

impl RoutingTable {
    /// Build a table, lowercasing every key. Later duplicates win; callers
    /// that care reject duplicates beforehand.
    pub fn new<I, K>(routes: I) -> Self
    where
        I: IntoIterator<Item = (K, BackendTarget)>,
        K: AsRef<str>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(host, target)| (host.as_ref().to_ascii_lowercase(), target))
                .collect(),
        }
    }

    /// Exact lookup of an already-lowercased hostname.
    pub fn get(&self, hostname: &str) -> Option<&BackendTarget> {
        self.routes.get(hostname)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes sorted by hostname.
    pub fn entries(&self) -> Vec<(&str, &BackendTarget)> {
        let mut entries: Vec<_> = self
            .routes
            .iter()
            .map(|(host, target)| (host.as_str(), target))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Raw configuration as read from disk.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(alias = "listen_adress")]
    pub listen_address: Option<String>,

    pub listen_port: Option<u16>,

    /// Client idle timeout until the handshake is parsed, in milliseconds.
    #[serde(alias = "socket_timeout")]
    pub socket_timeout_ms: Option<u64>,

    /// Backend connect and relay idle timeout, in milliseconds.
    pub backend_timeout_ms: Option<u64>,

    #[serde(default)]
    pub allow_fallback: bool,

    pub default_backend: Option<BackendTarget>,

    pub routes: Option<HashMap<String, BackendTarget>>,

    pub max_connections: Option<usize>,

    pub log_level: Option<String>,

    pub log_format: Option<LogFormat>,
}

/// Validated proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub socket_timeout_ms: u64,
    pub backend_timeout_ms: u64,
    pub allow_fallback: bool,
    pub default_backend: Option<BackendTarget>,
    pub routes: RoutingTable,
    pub max_connections: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl ProxyConfig {
    /// A config listening on `listen_address:listen_port` with no routes.
    pub fn new(listen_address: impl Into<String>, listen_port: u16) -> Self {
        Self {
            listen_address: listen_address.into(),
            listen_port,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            backend_timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
            allow_fallback: false,
            default_backend: None,
            routes: RoutingTable::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// `host:port` suitable for binding.
    pub fn listen_addr(&self) -> String {
        BackendTarget::new(self.listen_address.clone(), self.listen_port).to_string()
    }

    /// Multi-line human readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Configuration:\n");
        out.push_str(&format!("  Listen address: {}\n", self.listen_addr()));
        out.push_str(&format!("  Socket timeout: {}ms\n", self.socket_timeout_ms));
        out.push_str(&format!("  Backend timeout: {}ms\n", self.backend_timeout_ms));
        out.push_str(&format!("  Max connections: {}\n", self.max_connections));
        out.push_str(&format!("  Allow fallback: {}\n", self.allow_fallback));
        if let Some(default) = &self.default_backend {
            out.push_str(&format!("  Default backend: {}\n", default));
        }
        out.push_str(&format!("  Routes ({}):\n", self.routes.len()));
        for (host, target) in self.routes.entries() {
            out.push_str(&format!("    {} -> {}\n", host, target));
        }
        out
    }
}
