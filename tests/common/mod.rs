#![allow(dead_code)]

use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use droidlink::bridge::Bridge;
use droidlink::error::ConnectError;
use droidlink::neighbors::NeighborTable;
use droidlink::prober::PortProbe;
use droidlink::source::NetworkSource;
use droidlink::types::{AttachedDevice, DeviceState, ScanResult};

/// Fixed topology; records which subnets were swept.
#[derive(Default)]
pub struct FakeNetwork {
    pub subnets: Vec<Ipv4Net>,
    pub table: NeighborTable,
    pub swept: Mutex<Vec<Ipv4Net>>,
}

impl FakeNetwork {
    pub fn new(subnets: &[&str], neighbors: &[(&str, &str)]) -> Self {
        Self {
            subnets: subnets.iter().map(|s| s.parse().unwrap()).collect(),
            table: neighbors
                .iter()
                .map(|(ip, mac)| (ip.parse().unwrap(), mac.to_string()))
                .collect(),
            swept: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NetworkSource for FakeNetwork {
    async fn local_subnets(&self) -> Vec<Ipv4Net> {
        self.subnets.clone()
    }

    async fn sweep(&self, subnet: Ipv4Net) {
        self.swept.lock().unwrap().push(subnet);
    }

    async fn neighbor_table(&self) -> NeighborTable {
        self.table.clone()
    }
}

/// Prober with scripted verified endpoints and per-endpoint delays.
#[derive(Default)]
pub struct FakeProber {
    pub verified: HashSet<SocketAddrV4>,
    pub delays: HashMap<SocketAddrV4, Duration>,
    pub default_delay: Duration,
    pub calls: Mutex<Vec<SocketAddrV4>>,
    pub count: AtomicUsize,
}

impl FakeProber {
    pub fn verifying(endpoints: &[&str]) -> Self {
        Self {
            verified: endpoints.iter().map(|e| e.parse().unwrap()).collect(),
            ..Default::default()
        }
    }

    pub fn probed_ips(&self) -> Vec<Ipv4Addr> {
        let mut out: Vec<Ipv4Addr> = Vec::new();
        for ep in self.calls.lock().unwrap().iter() {
            if out.last() != Some(ep.ip()) {
                out.push(*ep.ip());
            }
        }
        out
    }

    pub fn probes(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProbe for FakeProber {
    async fn probe(&self, ip: Ipv4Addr, port: u16) -> ScanResult {
        let ep = SocketAddrV4::new(ip, port);
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(ep);
        let delay = self.delays.get(&ep).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        ScanResult { ip, port, verified: self.verified.contains(&ep) }
    }
}

/// Bridge with scripted USB devices, reachable endpoints and device models.
#[derive(Default)]
pub struct FakeBridge {
    pub usb: Vec<AttachedDevice>,
    pub reachable: HashSet<SocketAddrV4>,
    /// Endpoints whose `connect` times out.
    pub hanging: HashSet<SocketAddrV4>,
    /// serial -> model; unknown serials report `default_model`.
    pub models: HashMap<String, String>,
    pub default_model: String,
    pub connects: Mutex<Vec<SocketAddrV4>>,
    pub disconnects: Mutex<Vec<SocketAddrV4>>,
}

impl FakeBridge {
    pub fn with_model(model: &str) -> Self {
        Self { default_model: model.to_string(), ..Default::default() }
    }

    pub fn usb_device(mut self, serial: &str) -> Self {
        self.usb.push(AttachedDevice { serial: serial.to_string(), state: DeviceState::Device });
        self
    }

    pub fn reachable(mut self, endpoint: &str) -> Self {
        self.reachable.insert(endpoint.parse().unwrap());
        self
    }
}

#[async_trait]
impl Bridge for FakeBridge {
    async fn restart_server(&self) -> Result<(), ConnectError> {
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<AttachedDevice>, ConnectError> {
        Ok(self.usb.clone())
    }

    async fn connect(&self, endpoint: SocketAddrV4) -> Result<bool, ConnectError> {
        self.connects.lock().unwrap().push(endpoint);
        if self.hanging.contains(&endpoint) {
            return Err(ConnectError::HandshakeTimeout { command: format!("adb connect {endpoint}") });
        }
        Ok(self.reachable.contains(&endpoint))
    }

    async fn disconnect(&self, endpoint: SocketAddrV4) -> Result<(), ConnectError> {
        self.disconnects.lock().unwrap().push(endpoint);
        Ok(())
    }

    async fn shell(&self, serial: &str, args: &[&str]) -> Result<String, ConnectError> {
        let value = match args {
            ["getprop", "ro.product.model"] => {
                self.models.get(serial).cloned().unwrap_or_else(|| self.default_model.clone())
            }
            ["getprop", "ro.product.manufacturer"] => "Xiaomi".to_string(),
            ["getprop", "ro.build.version.release"] => "13".to_string(),
            ["settings", "get", "global", "device_name"] => "Redmi 10".to_string(),
            _ => return Err(ConnectError::Bridge(format!("unexpected shell {args:?}"))),
        };
        Ok(value)
    }
}
