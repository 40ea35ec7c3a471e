use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::time::Duration;
use tracing::warn;

use crate::neighbors::{read_neighbor_table, NeighborTable};
use crate::netdetect;
use crate::sweep::{self, SweepOptions};

/// Where the discovery engine learns about the local network.
///
/// The system implementation shells out to platform tools; tests substitute
/// a fixed topology.
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Every IPv4 subnet the host is attached to. Empty means "skip network scan".
    async fn local_subnets(&self) -> Vec<Ipv4Net>;

    /// Best-effort reachability probes to populate the neighbor cache.
    async fn sweep(&self, subnet: Ipv4Net);

    /// Current OS neighbor cache. Only meaningful after [`NetworkSource::sweep`].
    async fn neighbor_table(&self) -> NeighborTable;
}

/// [`NetworkSource`] backed by interface enumeration, `ping` and `ip neigh` / `arp -a`.
#[derive(Debug, Clone, Default)]
pub struct SystemNetwork {
    pub sweep: SweepOptions,
    pub neighbor_timeout: Duration,
}

impl SystemNetwork {
    pub fn new(sweep: SweepOptions, neighbor_timeout: Duration) -> Self {
        Self { sweep, neighbor_timeout }
    }
}

#[async_trait]
impl NetworkSource for SystemNetwork {
    async fn local_subnets(&self) -> Vec<Ipv4Net> {
        match netdetect::local_subnets() {
            Ok(nets) => nets,
            Err(e) => {
                warn!("Failed to get network info: {e:#}");
                Vec::new()
            }
        }
    }

    async fn sweep(&self, subnet: Ipv4Net) {
        sweep::sweep(subnet, &self.sweep).await;
    }

    async fn neighbor_table(&self) -> NeighborTable {
        let timeout = if self.neighbor_timeout.is_zero() {
            Duration::from_secs(5)
        } else {
            self.neighbor_timeout
        };
        read_neighbor_table(timeout).await
    }
}
