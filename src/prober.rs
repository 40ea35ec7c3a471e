use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use crate::bridge::Bridge;
use crate::types::ScanResult;

/// Checks one ip:port for a usable debugging endpoint.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr, port: u16) -> ScanResult;
}

/// Cheap filter: does a TCP connect succeed within `timeout`?
pub async fn tcp_open(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::V4(SocketAddrV4::new(ip, port));
    matches!(time::timeout(timeout, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Two-stage prober: raw TCP connect first, bridge handshake only on open ports.
pub struct BridgeProber<B> {
    bridge: Arc<B>,
    tcp_timeout: Duration,
}

impl<B: Bridge> BridgeProber<B> {
    pub fn new(bridge: Arc<B>, tcp_timeout: Duration) -> Self {
        Self { bridge, tcp_timeout }
    }
}

#[async_trait]
impl<B: Bridge + 'static> PortProbe for BridgeProber<B> {
    async fn probe(&self, ip: Ipv4Addr, port: u16) -> ScanResult {
        if !tcp_open(ip, port, self.tcp_timeout).await {
            return ScanResult::closed(ip, port);
        }
        debug!(%ip, port, "tcp open, attempting handshake");
        // The bridge applies its own handshake timeout; a timeout is just a failed probe.
        let verified = match self.bridge.connect(SocketAddrV4::new(ip, port)).await {
            Ok(v) => v,
            Err(e) => {
                debug!(%ip, port, "handshake failed: {e}");
                false
            }
        };
        ScanResult { ip, port, verified }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectError;
    use crate::types::AttachedDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Bridge whose handshake always ends with `reply`.
    struct StubBridge {
        reply: Result<bool, ConnectError>,
        connects: AtomicUsize,
    }

    impl StubBridge {
        fn new(reply: Result<bool, ConnectError>) -> Arc<Self> {
            Arc::new(Self { reply, connects: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Bridge for StubBridge {
        async fn restart_server(&self) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn devices(&self) -> Result<Vec<AttachedDevice>, ConnectError> {
            Ok(Vec::new())
        }

        async fn connect(&self, _endpoint: SocketAddrV4) -> Result<bool, ConnectError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }

        async fn disconnect(&self, _endpoint: SocketAddrV4) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn shell(&self, _serial: &str, _args: &[&str]) -> Result<String, ConnectError> {
            Ok(String::new())
        }
    }

    async fn open_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn open_port_with_refused_handshake_is_unverified() {
        let (_listener, port) = open_port().await;
        let bridge = StubBridge::new(Ok(false));
        let prober = BridgeProber::new(bridge.clone(), Duration::from_millis(500));

        let result = prober.probe(Ipv4Addr::LOCALHOST, port).await;
        assert!(!result.verified);
        assert_eq!(bridge.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_port_with_handshake_timeout_is_unverified() {
        let (_listener, port) = open_port().await;
        let bridge =
            StubBridge::new(Err(ConnectError::HandshakeTimeout { command: "adb connect".into() }));
        let prober = BridgeProber::new(bridge.clone(), Duration::from_millis(500));

        let result = prober.probe(Ipv4Addr::LOCALHOST, port).await;
        assert_eq!(result, ScanResult { ip: Ipv4Addr::LOCALHOST, port, verified: false });
        assert_eq!(bridge.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_port_with_handshake_is_verified() {
        let (_listener, port) = open_port().await;
        let prober = BridgeProber::new(StubBridge::new(Ok(true)), Duration::from_millis(500));
        assert!(prober.probe(Ipv4Addr::LOCALHOST, port).await.verified);
    }

    #[tokio::test]
    async fn closed_port_skips_handshake() {
        let (listener, port) = open_port().await;
        drop(listener);
        let bridge = StubBridge::new(Ok(true));
        let prober = BridgeProber::new(bridge.clone(), Duration::from_millis(500));

        assert!(!prober.probe(Ipv4Addr::LOCALHOST, port).await.verified);
        assert_eq!(bridge.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tcp_open_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(tcp_open(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn tcp_open_false_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!tcp_open(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await);
    }
}
