//! OS neighbor (ARP) cache reader.
//!
//! Understands three textual formats, one line at a time:
//! - `ip neigh show`: `192.168.0.5 dev wlan0 lladdr dc:6a:e7:06:b9:b8 REACHABLE`
//! - Linux/BSD `arp -a`: `? (192.168.0.5) at dc:6a:e7:6:b9:b8 [ether] on wlan0`
//! - Windows `arp -a`: `  192.168.0.5           dc-6a-e7-06-b9-b8     dynamic`
//!
//! Lines that match none of them, or that carry no usable unicast MAC, are skipped.

use lazy_regex::regex_captures;
use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::process::{self, RunError};
use crate::vendor::{is_unicast, normalize_mac};

/// IP to canonical MAC mapping read from the OS neighbor cache.
///
/// Entries keep the order in which the OS first reported them. Re-inserting
/// an address updates its MAC in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborTable {
    entries: Vec<(Ipv4Addr, String)>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ip: Ipv4Addr, mac: String) {
        match self.entries.iter_mut().find(|(known, _)| *known == ip) {
            Some(entry) => entry.1 = mac,
            None => self.entries.push((ip, mac)),
        }
    }

    pub fn get(&self, ip: &Ipv4Addr) -> Option<&str> {
        self.entries.iter().find(|(known, _)| known == ip).map(|(_, mac)| mac.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &String)> {
        self.entries.iter().map(|(ip, mac)| (ip, mac))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.entries.iter().map(|(ip, _)| ip)
    }
}

impl Extend<(Ipv4Addr, String)> for NeighborTable {
    fn extend<I: IntoIterator<Item = (Ipv4Addr, String)>>(&mut self, iter: I) {
        for (ip, mac) in iter {
            self.insert(ip, mac);
        }
    }
}

impl FromIterator<(Ipv4Addr, String)> for NeighborTable {
    fn from_iter<I: IntoIterator<Item = (Ipv4Addr, String)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl IntoIterator for NeighborTable {
    type Item = (Ipv4Addr, String);
    type IntoIter = std::vec::IntoIter<(Ipv4Addr, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Parse the textual output of any supported neighbor listing command.
pub fn parse_neighbor_output(text: &str) -> NeighborTable {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(Ipv4Addr, String)> {
    let (ip, mac, kind) = if let Some((_, ip, mac, state)) = regex_captures!(
        r"^\s*(\d+\.\d+\.\d+\.\d+)\s+dev\s+\S+\s+lladdr\s+([0-9A-Fa-f:]+)(?:\s+router)?\s+([A-Za-z]+)",
        line
    ) {
        (ip, mac, state)
    } else if let Some((_, ip, mac)) =
        regex_captures!(r"\((\d+\.\d+\.\d+\.\d+)\)\s+at\s+([0-9A-Fa-f:]+)", line)
    {
        let kind = if line.contains("permanent") { "permanent" } else { "dynamic" };
        (ip, mac, kind)
    } else if let Some((_, ip, mac, kind)) = regex_captures!(
        r"^\s*(\d+\.\d+\.\d+\.\d+)\s+([0-9A-Fa-f]{2}(?:-[0-9A-Fa-f]{2}){5})\s+(\w+)",
        line
    ) {
        (ip, mac, kind)
    } else {
        return None;
    };

    let kind = kind.to_ascii_lowercase();
    if matches!(kind.as_str(), "permanent" | "static" | "noarp" | "failed" | "incomplete") {
        return None;
    }
    let ip: Ipv4Addr = ip.parse().ok()?;
    if !is_unicast(mac) {
        return None;
    }
    Some((ip, normalize_mac(mac)?))
}

/// Read the current neighbor cache. Failures yield an empty table.
pub async fn read_neighbor_table(timeout: Duration) -> NeighborTable {
    let attempts: &[(&str, &[&str])] = if cfg!(target_os = "windows") {
        &[("arp", &["-a"])]
    } else {
        &[("ip", &["neigh", "show"]), ("arp", &["-an"])]
    };

    for (program, args) in attempts {
        let mut cmd = process::command(program);
        cmd.args(*args);
        match process::run(cmd, timeout).await {
            Ok(out) => {
                let table = parse_neighbor_output(&out.stdout);
                debug!(program, entries = table.len(), "read neighbor table");
                return table;
            }
            Err(RunError::Spawn(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(program, "not available, trying next neighbor source");
            }
            Err(RunError::Spawn(e)) => {
                warn!("Failed to read neighbor table with {program}: {e}");
                break;
            }
            Err(RunError::TimedOut) => {
                warn!("Timed out reading neighbor table with {program}");
                break;
            }
        }
    }
    NeighborTable::new()
}
