use anyhow::{Context, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::{ipv4_mask_to_prefix, Ipv4Net};
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Widest subnet swept per interface; larger networks are narrowed to the /24 holding the host.
pub const MAX_SWEEP_PREFIX: u8 = 24;

/// Detect every IPv4 subnet the host sits on, across all adapters.
///
/// Loopback is always skipped. Link-local (169.254/16) subnets are returned
/// only when no routable subnet exists.
pub fn local_subnets() -> Result<Vec<Ipv4Net>> {
    let mut addrs = Vec::new();
    for iface in get_if_addrs().context("failed to enumerate network interfaces")? {
        if let IfAddr::V4(v4) = iface.addr {
            debug!(iface = %iface.name, ip = %v4.ip, netmask = %v4.netmask, "interface address");
            addrs.push((v4.ip, v4.netmask));
        }
    }
    let subnets = subnets_from_addrs(&addrs);
    for net in &subnets {
        info!("Found subnet: {net}");
    }
    Ok(subnets)
}

/// Pure part of [`local_subnets`]: turn (address, netmask) pairs into sweepable subnets.
pub fn subnets_from_addrs(addrs: &[(Ipv4Addr, Ipv4Addr)]) -> Vec<Ipv4Net> {
    let mut routable: Vec<Ipv4Net> = Vec::new();
    let mut link_local: Vec<Ipv4Net> = Vec::new();
    for &(ip, mask) in addrs {
        if ip.is_loopback() || ip.is_unspecified() {
            continue;
        }
        let net = match ipv4_mask_to_prefix(mask) {
            Ok(prefix) if prefix >= MAX_SWEEP_PREFIX => {
                Ipv4Net::new(ip, prefix).map(|n| n.trunc()).unwrap_or_else(|_| ipv4_to_default_cidr(ip))
            }
            _ => ipv4_to_default_cidr(ip),
        };
        if expand_cidr_to_ips(net).is_empty() {
            continue;
        }
        let bucket = if ip.is_link_local() { &mut link_local } else { &mut routable };
        if !bucket.contains(&net) {
            bucket.push(net);
        }
    }
    let mut out = if routable.is_empty() { link_local } else { routable };
    // Sort for stable output
    out.sort_by_key(|n| (u32::from(n.network()), n.prefix_len()));
    out
}

/// Expand a subnet into its host addresses, excluding network and broadcast.
pub fn expand_cidr_to_ips(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end <= start + 1 {
        // Too small to have host addresses
        return Vec::new();
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}

/// Helper: convert an IPv4 address into its default /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    Ipv4Net::new(Ipv4Addr::new(o[0], o[1], o[2], 0), MAX_SWEEP_PREFIX)
        .unwrap_or_else(|_| Ipv4Net::from(ip))
}
