//! Connection acceptor.
//!
//! # Responsibilities
//! - Accept client connections from the bounded listener
//! - Spawn one session task per connection, inside a `connection` span
//! - Log each session's end at the level its category calls for
//! - Stop accepting on shutdown without severing running relays

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ConfigHandle;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::proxy::session::{Session, SessionEnd};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The handshake-routing TCP proxy.
pub struct ProxyServer {
    config: Arc<ConfigHandle>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    pub fn new(config: Arc<ConfigHandle>) -> Self {
        Self {
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live connection counter, shared with spawned sessions.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = listener.max_connections(),
            "Proxy started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = self.tracker.active_count(),
                        total_accepted = self.tracker.total_accepted(),
                        "Shutdown requested; no longer accepting connections"
                    );
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_session(stream, peer, permit),
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Accept error");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        tracing::info!("Proxy stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track(peer);
        let id = guard.id();
        let session = Session::new(id, Arc::clone(&self.config));
        let span = tracing::info_span!("connection", connection_id = %id, peer_addr = %peer);

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;

                tracing::info!("New connection");
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "Failed to set TCP_NODELAY on client");
                }

                match session.run(stream).await {
                    Ok(SessionEnd::Relayed(outcome)) => tracing::info!(
                        hostname = %outcome.hostname,
                        backend = %outcome.target,
                        end = ?outcome.stats.end,
                        bytes_to_backend = outcome.stats.client_to_backend,
                        bytes_to_client = outcome.stats.backend_to_client,
                        "Relay closed"
                    ),
                    Ok(SessionEnd::ClientLeft) => {}
                    Err(e) => e.report(),
                }
            }
            .instrument(span),
        );
    }
}
