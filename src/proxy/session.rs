//! Per-connection state machine.
//!
//! ```text
//! AwaitingData → Parsing → { Failed → Closed
//!                          | Parsed → ConnectingBackend → { Failed → Closed
//!                                                         | Relaying → Closed } }
//! ```
//!
//! Parsing loops back to AwaitingData while the frame is incomplete.
//! Closed is reachable from every state through an error or a timeout;
//! returning from `run` drops both sockets.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::timeout;

use crate::config::{BackendTarget, ConfigHandle};
use crate::net::ConnectionId;
use crate::protocol::{Feed, HandshakeParser, ParsedHandshake};
use crate::proxy::error::{Leg, ProxyError};
use crate::proxy::relay::{establish, RelayStats};
use crate::routing::{resolve, RouteKind};

/// Read size while waiting for the handshake.
const HANDSHAKE_READ_CHUNK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingData,
    Parsing,
    Parsed,
    ConnectingBackend,
    Relaying,
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingData => "awaiting_data",
            SessionState::Parsing => "parsing",
            SessionState::Parsed => "parsed",
            SessionState::ConnectingBackend => "connecting_backend",
            SessionState::Relaying => "relaying",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A relay that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub hostname: String,
    pub target: BackendTarget,
    pub route: RouteKind,
    pub stats: RelayStats,
}

/// How a session ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Relayed(SessionOutcome),
    /// The client hung up before its handshake was complete.
    ClientLeft,
}

/// Drives one client connection through parse → route → relay.
pub struct Session {
    id: ConnectionId,
    state: SessionState,
    parser: HandshakeParser,
    config: Arc<ConfigHandle>,
}

impl Session {
    pub fn new(id: ConnectionId, config: Arc<ConfigHandle>) -> Self {
        Self {
            id,
            state: SessionState::AwaitingData,
            parser: HandshakeParser::new(),
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion. Any error closes both legs.
    pub async fn run<C>(mut self, client: C) -> Result<SessionEnd, ProxyError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.drive(client).await;
        if result.is_err() {
            self.transition(SessionState::Failed);
        }
        self.transition(SessionState::Closed);
        result
    }

    async fn drive<C>(&mut self, mut client: C) -> Result<SessionEnd, ProxyError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let client_timeout = self.config.snapshot().client_timeout();

        let Some(handshake) = self.read_handshake(&mut client, client_timeout).await? else {
            return Ok(SessionEnd::ClientLeft);
        };

        tracing::info!(
            hostname = %handshake.hostname,
            protocol_version = handshake.protocol_version,
            "Server address detected"
        );

        // The only config read that affects routing; later reloads do not
        // reach this connection.
        let snapshot = self.config.snapshot();
        let resolved = resolve(&handshake.hostname, &snapshot)?;
        let backend_timeout = snapshot.backend_timeout();
        drop(snapshot);

        match resolved.kind {
            RouteKind::Exact => tracing::info!(backend = %resolved.target, "Forwarding"),
            RouteKind::Fallback => {
                tracing::info!(backend = %resolved.target, "Using fallback backend")
            }
        }

        self.transition(SessionState::ConnectingBackend);
        let stats = establish(
            client,
            &resolved.target,
            &handshake.buffered,
            backend_timeout,
            || self.transition(SessionState::Relaying),
        )
        .await?;

        Ok(SessionEnd::Relayed(SessionOutcome {
            hostname: handshake.hostname,
            target: resolved.target,
            route: resolved.kind,
            stats,
        }))
    }

    /// Feed client bytes to the parser until it decides.
    ///
    /// The idle timer restarts on every read. `None` means the client closed
    /// before the frame was complete.
    async fn read_handshake<C>(
        &mut self,
        client: &mut C,
        idle: Duration,
    ) -> Result<Option<ParsedHandshake>, ProxyError>
    where
        C: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; HANDSHAKE_READ_CHUNK];

        loop {
            let n = match timeout(idle, client.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    tracing::debug!(
                        buffered = self.parser.buffered_len(),
                        "Client closed before completing handshake"
                    );
                    return Ok(None);
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(ProxyError::socket(Leg::Client)(e)),
                Err(_) => {
                    return Err(ProxyError::Timeout {
                        leg: Leg::Client,
                        after: idle,
                    })
                }
            };

            self.transition(SessionState::Parsing);
            match self.parser.feed(&chunk[..n])? {
                Feed::NeedMoreData => self.transition(SessionState::AwaitingData),
                Feed::Parsed(handshake) => {
                    self.transition(SessionState::Parsed);
                    return Ok(Some(handshake));
                }
                // Only reachable after a terminal outcome, which returns above.
                Feed::Ignored => return Ok(None),
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::trace!(connection_id = %self.id, from = %self.state, to = %next, "Session state");
            self.state = next;
        }
    }
}
