//! Tiered connection flow: USB, then the cached endpoint, then network discovery.

use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::bridge::{device_info, AdbBridge, Bridge};
use crate::cache::ConnectionCache;
use crate::config::ConnectorConfig;
use crate::error::ConnectError;
use crate::prober::{BridgeProber, PortProbe};
use crate::scanner::{DiscoveryEngine, DiscoveryOutcome};
use crate::source::{NetworkSource, SystemNetwork};
use crate::types::{ConnectedSession, ConnectionRecord, Transport};

/// Connector wired to the real `adb` executable and OS network tools.
pub type SystemConnector = Connector<AdbBridge, SystemNetwork, BridgeProber<AdbBridge>>;

pub struct Connector<B, N, P> {
    config: ConnectorConfig,
    cache: ConnectionCache,
    bridge: Arc<B>,
    engine: DiscoveryEngine<N, P>,
}

impl SystemConnector {
    pub fn from_config(config: ConnectorConfig) -> Self {
        let mut adb = AdbBridge::new(config.adb_path.clone());
        adb.handshake_timeout = config.handshake_timeout;
        adb.command_timeout = config.command_timeout;
        let bridge = Arc::new(adb);
        let network = Arc::new(SystemNetwork::new(config.sweep.clone(), config.command_timeout));
        let prober = Arc::new(BridgeProber::new(bridge.clone(), config.tcp_timeout));
        Self::new(config, bridge, network, prober)
    }
}

impl<B, N, P> Connector<B, N, P>
where
    B: Bridge + 'static,
    N: NetworkSource,
    P: PortProbe + 'static,
{
    pub fn new(config: ConnectorConfig, bridge: Arc<B>, network: Arc<N>, prober: Arc<P>) -> Self {
        let cache = ConnectionCache::new(config.cache_path.clone());
        let engine = DiscoveryEngine::new(network, prober, config.discovery_options());
        Self { config, cache, bridge, engine }
    }

    /// Try each tier in order and stop at the first success. On total failure
    /// the reason comes from the last tier attempted.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<ConnectedSession, ConnectError> {
        info!("Phone connector starting");

        match self.try_usb().await {
            Ok(session) => return Ok(session),
            Err(e) => info!("  USB not connected ({e})"),
        }

        let cached = self.cache.load();
        match &cached {
            Some(record) => match self.try_cached(record).await {
                Ok(session) => return Ok(session),
                Err(e) => info!("  Cached connection failed ({e})"),
            },
            None => info!("[2/3] No cached connection info"),
        }

        let result = self.try_network(cached.as_ref()).await;
        if let Err(e) = &result {
            error!("CONNECTION FAILED: {e}");
            error!("1. USB: plug in cable, enable USB debugging, allow this computer");
            error!("2. Wireless: enable Wireless debugging in Developer options");
            error!("3. Network: phone and computer must share a network");
        }
        result
    }

    #[instrument(skip(self))]
    async fn try_usb(&self) -> Result<ConnectedSession, ConnectError> {
        info!("[1/3] Checking USB connection...");
        if self.config.restart_server {
            if let Err(e) = self.bridge.restart_server().await {
                warn!("Bridge server restart failed: {e}");
            }
        }
        let devices = self.bridge.devices().await?;
        let usb = devices
            .into_iter()
            .find(|d| d.is_usb() && d.is_ready())
            .ok_or(ConnectError::NotFound)?;

        info!("[OK] USB connection found: {}", usb.serial);
        let device = device_info(self.bridge.as_ref(), &usb.serial).await;
        Ok(ConnectedSession { transport: Transport::Usb { serial: usb.serial }, device, record: None })
    }

    #[instrument(skip(self, record), fields(ip = %record.ip, port = record.port))]
    async fn try_cached(&self, record: &ConnectionRecord) -> Result<ConnectedSession, ConnectError> {
        info!("[2/3] Trying cached connection...");
        let mut last_err = ConnectError::NotFound;

        let mut ports = vec![record.port];
        ports.extend(self.config.common_ports.iter().copied().filter(|&p| p != record.port));

        for (i, port) in ports.into_iter().enumerate() {
            if i == 1 {
                info!("  Cached port failed, trying other ports on {}...", record.ip);
            }
            let mut candidate = record.clone();
            candidate.port = port;
            match self.bridge.connect(candidate.endpoint()).await {
                Ok(true) => {
                    let transport = Transport::Wireless { endpoint: candidate.endpoint() };
                    let device = device_info(self.bridge.as_ref(), &transport.serial()).await;
                    if candidate.device_model.is_empty() {
                        candidate.device_model = device.model.clone();
                    }
                    if candidate.device_name.is_empty() {
                        candidate.device_name = device.device_name.clone();
                    }
                    candidate.last_connected = OffsetDateTime::now_utc();
                    self.persist(&candidate);
                    return Ok(ConnectedSession { transport, device, record: Some(candidate) });
                }
                Ok(false) => {}
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    #[instrument(skip(self, cached))]
    async fn try_network(
        &self,
        cached: Option<&ConnectionRecord>,
    ) -> Result<ConnectedSession, ConnectError> {
        info!("[3/3] Scanning network for phone...");
        let expected_model = cached.map(|r| r.device_model.as_str()).filter(|m| !m.is_empty());
        info!("Looking for: {}", expected_model.unwrap_or("any Android device"));
        let cached_mac = cached.and_then(|r| r.mac.as_deref());
        if let Some(mac) = cached_mac {
            info!("Cached MAC: {mac}");
        }

        let Some(candidates) = self.engine.candidates(cached_mac).await else {
            return Err(ConnectError::NoNetwork);
        };

        // Endpoints that answered as a different phone are skipped on resume.
        let mut rejected: HashSet<SocketAddrV4> = HashSet::new();
        let mut mismatch: Option<ConnectError> = None;
        let mut start = 0;
        loop {
            let remaining = &candidates[start..];
            let found = match self.engine.scan_candidates(remaining, &rejected).await {
                DiscoveryOutcome::Found(found) => found,
                DiscoveryOutcome::NoNetwork => return Err(ConnectError::NoNetwork),
                DiscoveryOutcome::NotFound => return Err(mismatch.unwrap_or(ConnectError::NotFound)),
            };

            let endpoint = SocketAddrV4::new(found.ip, found.port);
            let transport = Transport::Wireless { endpoint };
            let device = device_info(self.bridge.as_ref(), &transport.serial()).await;

            if let Some(expected) = expected_model {
                if device.model != expected {
                    warn!("Wrong device: {} at {endpoint} (expected {expected})", device.model);
                    if let Err(e) = self.bridge.disconnect(endpoint).await {
                        warn!("Failed to disconnect {endpoint}: {e}");
                    }
                    rejected.insert(endpoint);
                    start += remaining.iter().position(|c| c.ip == found.ip).unwrap_or(0);
                    mismatch = Some(ConnectError::WrongDevice {
                        expected: expected.to_string(),
                        found: device.model,
                    });
                    info!("Continuing scan...");
                    continue;
                }
            }

            let record = ConnectionRecord {
                ip: found.ip,
                port: found.port,
                mac: found
                    .mac
                    .or_else(|| cached.filter(|r| r.ip == found.ip).and_then(|r| r.mac.clone())),
                device_model: device.model.clone(),
                device_name: device.device_name.clone(),
                last_connected: OffsetDateTime::now_utc(),
            };
            self.persist(&record);
            return Ok(ConnectedSession { transport, device, record: Some(record) });
        }
    }

    /// Cache write failures never fail an established connection.
    fn persist(&self, record: &ConnectionRecord) {
        if let Err(e) = self.cache.save(record) {
            warn!("Failed to save cache to {}: {e:#}", self.cache.path().display());
        }
    }
}
