use std::path::PathBuf;
use std::time::Duration;

use crate::ports::{default_common_ports, default_deep_scan_ports};
use crate::scanner::DiscoveryOptions;
use crate::sweep::SweepOptions;

pub const CACHE_FILE_NAME: &str = "connection_cache.json";

/// Everything the connector needs, injected at construction.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Where the last good endpoint is persisted.
    pub cache_path: PathBuf,

    /// Debugging-bridge executable.
    pub adb_path: PathBuf,

    /// Ports tried on the cached IP and first on every discovered host.
    pub common_ports: Vec<u16>,

    /// Ports covered by the parallel deep scan.
    pub deep_scan_ports: Vec<u16>,

    /// Raw TCP connect timeout used as the cheap filter.
    pub tcp_timeout: Duration,

    /// Timeout for the bridge `connect` handshake.
    pub handshake_timeout: Duration,

    /// Timeout for other bridge commands and neighbor table reads.
    pub command_timeout: Duration,

    pub sweep: SweepOptions,

    /// Maximum number of concurrent port probes.
    pub concurrency: usize,

    /// Deep scan hosts whose MAC does not belong to a known phone maker.
    pub deep_scan_unknown: bool,

    /// Restart the bridge server before looking for USB devices.
    pub restart_server: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            adb_path: default_adb_path(),
            common_ports: default_common_ports(),
            deep_scan_ports: default_deep_scan_ports(),
            tcp_timeout: Duration::from_millis(200),
            handshake_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            sweep: SweepOptions::default(),
            concurrency: 64,
            deep_scan_unknown: false,
            restart_server: true,
        }
    }
}

impl ConnectorConfig {
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            common_ports: self.common_ports.clone(),
            deep_scan_ports: self.deep_scan_ports.clone(),
            concurrency: self.concurrency,
            deep_scan_unknown: self.deep_scan_unknown,
        }
    }
}

/// `<data dir>/droidlink/connection_cache.json`, or the working directory
/// when no data dir is known.
pub fn default_cache_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("droidlink").join(CACHE_FILE_NAME),
        None => PathBuf::from(CACHE_FILE_NAME),
    }
}

/// `adb` from `PATH`, falling back to the bare name so spawn errors stay readable.
pub fn default_adb_path() -> PathBuf {
    which::which("adb").unwrap_or_else(|_| PathBuf::from("adb"))
}
