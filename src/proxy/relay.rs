//! Backend connection and full-duplex relay.
//!
//! # Responsibilities
//! - Connect to the routed backend within the backend timeout
//! - Replay the bytes buffered during the handshake
//! - Copy bytes both ways until either side closes, errors or idles out
//!
//! # Design Decisions
//! - One idle clock shared by both directions: any byte moved either way
//!   resets it
//! - The first direction to finish tears down the pair (no half-close)
//! - Backpressure is the transport's: each direction awaits its own write
//!   before reading again, and directions never wait on each other

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Instant};

use crate::config::BackendTarget;
use crate::proxy::error::{Leg, ProxyError};

/// Read buffer size per relay direction.
pub const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Which side closed a relay that ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    ClientClosed,
    BackendClosed,
}

/// Summary of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub end: RelayEnd,
    /// Includes the replayed handshake bytes.
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Connect to `target`, giving up after `connect_timeout`.
pub async fn connect_backend(
    target: &BackendTarget,
    connect_timeout: Duration,
) -> Result<TcpStream, ProxyError> {
    let stream = match timeout(
        connect_timeout,
        TcpStream::connect((target.host.as_str(), target.port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(ProxyError::BackendConnect {
                target: target.clone(),
                source,
            })
        }
        Err(_) => return Err(connect_timed_out(target, connect_timeout)),
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY on backend");
    }

    Ok(stream)
}

/// A connect that outlives its deadline counts as unreachable, not idle.
fn connect_timed_out(target: &BackendTarget, after: Duration) -> ProxyError {
    ProxyError::BackendConnect {
        target: target.clone(),
        source: io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no connection after {}ms", after.as_millis()),
        ),
    }
}

/// Connect to `target`, replay `buffered`, then relay until the pair closes.
///
/// `on_connected` runs once the backend socket is open, before the replay.
pub async fn establish<C, F>(
    client: C,
    target: &BackendTarget,
    buffered: &[u8],
    backend_timeout: Duration,
    on_connected: F,
) -> Result<RelayStats, ProxyError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(),
{
    let backend = connect_backend(target, backend_timeout).await?;
    on_connected();
    relay(client, backend, buffered, backend_timeout).await
}

/// Replay `buffered` to `backend`, then copy both ways.
///
/// Returns when either side closes, either side errors, or no byte moved
/// in either direction for `idle_timeout`. Both streams are dropped on
/// return, closing both legs.
pub async fn relay<C, B>(
    client: C,
    mut backend: B,
    buffered: &[u8],
    idle_timeout: Duration,
) -> Result<RelayStats, ProxyError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let backend_timed_out = ProxyError::Timeout {
        leg: Leg::Backend,
        after: idle_timeout,
    };

    match timeout(idle_timeout, backend.write_all(buffered)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ProxyError::socket(Leg::Backend)(e)),
        Err(_) => return Err(backend_timed_out),
    }

    let clock = IdleClock::new(idle_timeout);
    let upstream = AtomicU64::new(buffered.len() as u64);
    let downstream = AtomicU64::new(0);

    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut backend_rd, mut backend_wr) = tokio::io::split(backend);

    let end = tokio::select! {
        res = pump(&mut client_rd, &mut backend_wr, Leg::Client, Leg::Backend, &clock, &upstream) => {
            res.map(|()| RelayEnd::ClientClosed)
        }
        res = pump(&mut backend_rd, &mut client_wr, Leg::Backend, Leg::Client, &clock, &downstream) => {
            res.map(|()| RelayEnd::BackendClosed)
        }
        () = clock.expired() => Err(backend_timed_out),
    }?;

    Ok(RelayStats {
        end,
        client_to_backend: upstream.load(Ordering::Relaxed),
        backend_to_client: downstream.load(Ordering::Relaxed),
    })
}

/// Copy from `reader` to `writer` until EOF.
async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    from: Leg,
    to: Leg,
    clock: &IdleClock,
    counter: &AtomicU64,
) -> Result<(), ProxyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await.map_err(ProxyError::socket(from))?;
        if n == 0 {
            return Ok(());
        }
        clock.touch();

        writer
            .write_all(&buf[..n])
            .await
            .map_err(ProxyError::socket(to))?;
        writer.flush().await.map_err(ProxyError::socket(to))?;
        clock.touch();

        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Idle deadline that both relay directions push forward.
struct IdleClock {
    origin: Instant,
    /// Milliseconds since `origin` of the last activity.
    last_activity: AtomicU64,
    timeout: Duration,
}

impl IdleClock {
    fn new(timeout: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_activity: AtomicU64::new(0),
            timeout,
        }
    }

    fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_activity.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn deadline(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_activity.load(Ordering::Relaxed)) + self.timeout
    }

    /// Resolves once a full timeout passes without `touch`.
    async fn expired(&self) {
        loop {
            let deadline = self.deadline();
            if Instant::now() >= deadline {
                return;
            }
            sleep_until(deadline).await;
        }
    }
}
