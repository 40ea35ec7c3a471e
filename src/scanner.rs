//! Discovery engine: topology, sweep, neighbor read, prioritisation and
//! parallel port probing with first-success cancellation.

use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::neighbors::NeighborTable;
use crate::netdetect::expand_cidr_to_ips;
use crate::prober::PortProbe;
use crate::source::NetworkSource;
use crate::types::{CandidateHost, FoundEndpoint, ScanResult, VendorTag};
use crate::vendor::{self, normalize_mac, Vendor};

/// Ports and parallelism for the scan phase.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Probed first on every candidate.
    pub common_ports: Vec<u16>,
    /// Probed in parallel when no common port answers.
    pub deep_scan_ports: Vec<u16>,
    /// Max concurrent probes.
    pub concurrency: usize,
    /// Also deep scan hosts with no phone-maker OUI.
    pub deep_scan_unknown: bool,
}

/// Terminal state of one discovery pass. Only `Found` is a success; the
/// other two are normal outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(FoundEndpoint),
    NoNetwork,
    NotFound,
}

/// Map a neighbor MAC to its scan tier. `cached_mac` must already be canonical.
pub fn vendor_tag(mac: &str, cached_mac: Option<&str>) -> VendorTag {
    if cached_mac.is_some() && normalize_mac(mac).as_deref() == cached_mac {
        return VendorTag::Cached;
    }
    match vendor::identify(mac) {
        Vendor::Xiaomi => VendorTag::Xiaomi,
        Vendor::Google | Vendor::Samsung => VendorTag::AndroidOther,
        Vendor::Other => VendorTag::Unknown,
    }
}

/// Build the scan order: cached MAC, Xiaomi, other Android makers, remaining
/// responsive hosts, then every other address of the subnets. Order within a
/// tier follows the neighbor table.
pub fn prioritize(
    subnets: &[Ipv4Net],
    neighbors: &NeighborTable,
    cached_mac: Option<&str>,
) -> Vec<CandidateHost> {
    let cached_mac = cached_mac.and_then(normalize_mac);
    let in_scope = |ip: &Ipv4Addr| subnets.iter().any(|n| n.contains(ip));

    let mut tiers: [Vec<CandidateHost>; 4] = Default::default();
    for (ip, mac) in neighbors.iter().filter(|(ip, _)| in_scope(ip)) {
        let tag = vendor_tag(mac, cached_mac.as_deref());
        let slot = match tag {
            VendorTag::Cached => 0,
            VendorTag::Xiaomi => 1,
            VendorTag::AndroidOther => 2,
            VendorTag::Unknown => 3,
        };
        let mac = normalize_mac(mac).unwrap_or_else(|| mac.clone());
        tiers[slot].push(CandidateHost { ip: *ip, mac: Some(mac), tag });
    }

    let mut order: Vec<CandidateHost> = tiers.into_iter().flatten().collect();
    let mut seen: HashSet<Ipv4Addr> = order.iter().map(|c| c.ip).collect();
    for net in subnets {
        for ip in expand_cidr_to_ips(*net) {
            if seen.insert(ip) {
                order.push(CandidateHost { ip, mac: None, tag: VendorTag::Unknown });
            }
        }
    }
    order
}

/// Locates a wireless debugging endpoint on the local network.
pub struct DiscoveryEngine<N, P> {
    network: Arc<N>,
    prober: Arc<P>,
    opts: DiscoveryOptions,
}

impl<N, P> DiscoveryEngine<N, P>
where
    N: NetworkSource,
    P: PortProbe + 'static,
{
    pub fn new(network: Arc<N>, prober: Arc<P>, opts: DiscoveryOptions) -> Self {
        Self { network, prober, opts }
    }

    /// Run all four phases; the first verified endpoint ends the pass.
    #[instrument(skip(self))]
    pub async fn discover(&self, cached_mac: Option<&str>) -> DiscoveryOutcome {
        match self.candidates(cached_mac).await {
            Some(candidates) => self.scan_candidates(&candidates, &HashSet::new()).await,
            None => DiscoveryOutcome::NoNetwork,
        }
    }

    /// Topology, sweep, neighbor read and prioritisation. `None` when the
    /// host has no usable subnet.
    pub async fn candidates(&self, cached_mac: Option<&str>) -> Option<Vec<CandidateHost>> {
        let subnets = self.network.local_subnets().await;
        if subnets.is_empty() {
            info!("No network subnets found");
            return None;
        }

        let mut neighbors = NeighborTable::new();
        for subnet in &subnets {
            self.network.sweep(*subnet).await;
            let table = self.network.neighbor_table().await;
            let live = table.keys().filter(|ip| subnet.contains(*ip)).count();
            info!("Found {live} live device(s) on {subnet}");
            neighbors.extend(table);
        }
        for (ip, mac) in neighbors.iter().take(10) {
            info!("  {ip} - {mac} ({})", vendor::identify(mac));
        }

        let candidates = prioritize(&subnets, &neighbors, cached_mac);
        log_scan_order(&candidates);
        Some(candidates)
    }

    /// Scan phase alone, over an already ordered candidate list. Endpoints in
    /// `excluded` are never probed.
    pub async fn scan_candidates(
        &self,
        candidates: &[CandidateHost],
        excluded: &HashSet<SocketAddrV4>,
    ) -> DiscoveryOutcome {
        let cancel = CancellationToken::new();
        let winner: Arc<OnceLock<ScanResult>> = Arc::new(OnceLock::new());
        let common: HashSet<u16> = self.opts.common_ports.iter().copied().collect();
        let deep: Vec<u16> =
            self.opts.deep_scan_ports.iter().copied().filter(|p| !common.contains(p)).collect();

        let total = candidates.len();
        for (idx, cand) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            // Unlisted last-resort hosts are too many to announce individually.
            if cand.mac.is_some() {
                info!("[{}/{}] Trying {} ({})", idx + 1, total, cand.ip, cand.tag);
            } else {
                debug!("[{}/{}] Trying {} ({})", idx + 1, total, cand.ip, cand.tag);
            }

            self.scan_ports(cand.ip, &self.opts.common_ports, excluded, &cancel, &winner).await;
            if cancel.is_cancelled() {
                break;
            }

            let deep_allowed = cand.tag.is_android_likely() || self.opts.deep_scan_unknown;
            if deep_allowed && !deep.is_empty() {
                info!("  Deep scanning {} ports on {}...", deep.len(), cand.ip);
                self.scan_ports(cand.ip, &deep, excluded, &cancel, &winner).await;
            }
        }

        match winner.get() {
            Some(hit) => {
                let mac = candidates.iter().find(|c| c.ip == hit.ip).and_then(|c| c.mac.clone());
                info!("SUCCESS! Connected to {}:{}", hit.ip, hit.port);
                DiscoveryOutcome::Found(FoundEndpoint { ip: hit.ip, port: hit.port, mac })
            }
            None => {
                info!("Network scan complete - no phone found");
                DiscoveryOutcome::NotFound
            }
        }
    }

    /// Probe `ports` on `ip` through a bounded pool. The first verified result
    /// claims `winner` and cancels every outstanding and future probe.
    async fn scan_ports(
        &self,
        ip: Ipv4Addr,
        ports: &[u16],
        excluded: &HashSet<SocketAddrV4>,
        cancel: &CancellationToken,
        winner: &Arc<OnceLock<ScanResult>>,
    ) {
        let sem = Arc::new(Semaphore::new(self.opts.concurrency.clamp(1, 5_000)));
        let scanned = Arc::new(AtomicU64::new(0));
        let mut set = JoinSet::new();

        for (i, &port) in ports.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if excluded.contains(&SocketAddrV4::new(ip, port)) {
                continue;
            }
            let permit = tokio::select! {
                p = sem.clone().acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => break,
            };
            let prober = self.prober.clone();
            let cancel = cancel.clone();
            let winner = winner.clone();
            let scanned_task = scanned.clone();

            set.spawn(async move {
                let _permit = permit; // keep permit until task completes

                if cancel.is_cancelled() {
                    return;
                }
                let result = prober.probe(ip, port).await;
                scanned_task.fetch_add(1, Ordering::Relaxed);
                // In-flight probes that finish after the winner just drop their result.
                if result.verified && winner.set(result).is_ok() {
                    cancel.cancel();
                }
            });

            while set.try_join_next().is_some() {}
            if i > 0 && i % 5_000 == 0 {
                info!(
                    "    Scan progress on {ip}: {}/{} ports...",
                    scanned.load(Ordering::Relaxed),
                    ports.len()
                );
            }
        }

        while set.join_next().await.is_some() {}
    }
}

fn log_scan_order(candidates: &[CandidateHost]) {
    let count = |t: VendorTag| candidates.iter().filter(|c| c.mac.is_some() && c.tag == t).count();
    let responsive = candidates.iter().filter(|c| c.mac.is_some()).count();
    info!(
        "Scan order: {} responsive device(s), {} more address(es) as last resort",
        responsive,
        candidates.len() - responsive
    );
    if count(VendorTag::Cached) > 0 {
        info!("  *** Found cached MAC! Trying it first ***");
    }
    let xiaomi = count(VendorTag::Xiaomi);
    if xiaomi > 0 {
        info!("  - {xiaomi} Xiaomi device(s) (high priority)");
    }
    let android = count(VendorTag::AndroidOther);
    if android > 0 {
        info!("  - {android} Android device(s)");
    }
}
