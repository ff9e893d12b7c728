//! Active configuration snapshot.
//!
//! # Responsibilities
//! - Hold the current `ProxyConfig` behind an atomically swappable pointer
//! - Validate reload candidates before publishing them
//! - Keep the last-known-good config when a candidate is rejected
//!
//! # Design Decisions
//! - Readers take an `Arc` snapshot and keep it; a reload never mutates it
//! - Reload publishes a brand-new structure, never patches fields
//! - Reload and readers never block each other (no locks)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::{read_config_file, ConfigError};
use crate::config::schema::{ConfigFile, ProxyConfig};
use crate::config::validation::validate_config;

/// Shared handle to the active configuration.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<ProxyConfig>,
    source: Option<PathBuf>,
}

impl ConfigHandle {
    /// Handle with no backing file. `reload` has nothing to read.
    pub fn new(config: ProxyConfig) -> Self {
        warn_on_dangling_fallback(&config);
        Self {
            current: ArcSwap::from_pointee(config),
            source: None,
        }
    }

    /// Handle whose `reload` re-reads `path`.
    pub fn with_source(config: ProxyConfig, path: impl Into<PathBuf>) -> Self {
        warn_on_dangling_fallback(&config);
        Self {
            current: ArcSwap::from_pointee(config),
            source: Some(path.into()),
        }
    }

    /// Current snapshot. Holders keep seeing it even after a reload.
    pub fn snapshot(&self) -> Arc<ProxyConfig> {
        self.current.load_full()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Re-read the source file and publish it if valid.
    ///
    /// On any error the previous config stays active.
    pub fn reload(&self) -> Result<Arc<ProxyConfig>, ConfigError> {
        let Some(path) = self.source.as_deref() else {
            tracing::warn!("Reload requested but no config file is attached");
            return Ok(self.snapshot());
        };

        tracing::info!(path = %path.display(), "Reloading config");
        let result = read_config_file(path).and_then(|file| self.apply(file));
        if let Err(e) = &result {
            tracing::error!(
                "Failed to reload config: {}. Keeping current configuration.",
                e
            );
        }
        result
    }

    /// Validate an in-memory candidate and publish it.
    pub fn apply(&self, file: ConfigFile) -> Result<Arc<ProxyConfig>, ConfigError> {
        let config = validate_config(file).map_err(ConfigError::Validation)?;
        Ok(self.publish(config))
    }

    /// Publish an already validated config.
    pub fn publish(&self, config: ProxyConfig) -> Arc<ProxyConfig> {
        warn_on_dangling_fallback(&config);

        let previous = self.snapshot();
        if previous.listen_addr() != config.listen_addr() {
            tracing::warn!(
                active = %previous.listen_addr(),
                configured = %config.listen_addr(),
                "Listen address changed; takes effect after restart"
            );
        }

        let config = Arc::new(config);
        self.current.store(Arc::clone(&config));

        tracing::info!(
            routes = config.routes.len(),
            allow_fallback = config.allow_fallback,
            "Config successfully reloaded; new connections use the updated config"
        );
        config
    }
}

fn warn_on_dangling_fallback(config: &ProxyConfig) {
    if config.allow_fallback && config.default_backend.is_none() {
        tracing::warn!("allow_fallback is set but no default_backend is configured");
    }
}
