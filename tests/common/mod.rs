//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use handshake_proxy::config::{BackendTarget, ConfigHandle, ProxyConfig, RoutingTable};
use handshake_proxy::net::{ConnectionTracker, Listener};
use handshake_proxy::protocol::varint::encode;
use handshake_proxy::{ProxyServer, Shutdown};

/// Backend that echoes everything back, prefixed by nothing.
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicU64>,
}

impl EchoBackend {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut stream, _)) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(async move {
                            let mut buf = vec![0u8; 8192];
                            loop {
                                match stream.read(&mut buf).await {
                                    Ok(0) | Err(_) => break,
                                    Ok(n) => {
                                        if stream.write_all(&buf[..n]).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, connections }
    }

    pub fn target(&self) -> BackendTarget {
        BackendTarget::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }
}

/// A handshake frame for `host`, followed by the port and next-state fields.
pub fn handshake(host: &str) -> Vec<u8> {
    let mut body = encode(0x00);
    body.extend(encode(763));
    body.extend(encode(host.len() as u32));
    body.extend_from_slice(host.as_bytes());
    body.extend_from_slice(&25565u16.to_be_bytes());
    body.extend(encode(2));

    let mut out = encode(body.len() as u32);
    out.extend(body);
    out
}

/// Config routing each `(hostname, target)` pair.
pub fn config_with_routes<'a>(routes: impl IntoIterator<Item = (&'a str, BackendTarget)>) -> ProxyConfig {
    let mut config = ProxyConfig::new("127.0.0.1", 25565);
    config.routes = RoutingTable::new(routes);
    config.socket_timeout_ms = 2_000;
    config.backend_timeout_ms = 5_000;
    config
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub config: Arc<ConfigHandle>,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
}

impl RunningProxy {
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    start_proxy_with_handle(Arc::new(ConfigHandle::new(config))).await
}

pub async fn start_proxy_with_handle(handle: Arc<ConfigHandle>) -> RunningProxy {
    let listener = Listener::bind("127.0.0.1:0", 64).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(Arc::clone(&handle));
    let tracker = server.tracker();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    RunningProxy {
        addr,
        config: handle,
        shutdown,
        tracker,
    }
}

/// Read until the peer closes or `limit` passes. `None` on timeout.
pub async fn read_until_closed(stream: &mut TcpStream, limit: Duration) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match tokio::time::timeout(limit, stream.read_to_end(&mut out)).await {
        Ok(_) => Some(out),
        Err(_) => None,
    }
}
