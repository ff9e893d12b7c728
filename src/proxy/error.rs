//! Per-connection failure taxonomy.
//!
//! Every variant is terminal for the connection pair and none escapes the
//! connection's task. The category decides the log level.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::config::BackendTarget;
use crate::protocol::ProtocolError;
use crate::routing::RoutingError;

/// One side of a proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Client,
    Backend,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Client => f.write_str("client"),
            Leg::Backend => f.write_str("backend"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("failed to connect to backend {target}: {source}")]
    BackendConnect {
        target: BackendTarget,
        #[source]
        source: io::Error,
    },

    #[error("{leg} socket error: {source}")]
    Socket {
        leg: Leg,
        #[source]
        source: io::Error,
    },

    #[error("{leg} idle timeout after {}ms", .after.as_millis())]
    Timeout { leg: Leg, after: Duration },
}

impl ProxyError {
    pub(crate) fn socket(leg: Leg) -> impl FnOnce(io::Error) -> ProxyError {
        move |source| ProxyError::Socket { leg, source }
    }

    /// Short category name used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Protocol(_) => "protocol",
            ProxyError::Routing(_) => "routing",
            ProxyError::BackendConnect { .. } => "backend_connect",
            ProxyError::Socket { .. } => "socket",
            ProxyError::Timeout { .. } => "timeout",
        }
    }

    /// Client-caused or expected conditions log at warn, the rest at error.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ProxyError::Protocol(_) | ProxyError::Routing(_) | ProxyError::Timeout { .. }
        )
    }

    /// Emit the categorized log line for this failure.
    pub fn report(&self) {
        if self.is_warning() {
            tracing::warn!(kind = self.kind(), error = %self, "Closing connection");
        } else {
            tracing::error!(kind = self.kind(), error = %self, "Closing connection");
        }
    }
}
