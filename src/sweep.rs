use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info};

use crate::netdetect::expand_cidr_to_ips;
use crate::process;

/// Tuning for the fire-and-forget ping sweep.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Reply wait handed to each `ping`.
    pub per_host: Duration,
    /// Upper bound for the whole sweep of one subnet.
    pub overall: Duration,
    /// Concurrent `ping` processes.
    pub concurrency: usize,
    /// Pause after the sweep so the OS neighbor cache can settle.
    pub settle: Duration,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            per_host: Duration::from_secs(1),
            overall: Duration::from_secs(5),
            concurrency: 128,
            settle: Duration::from_millis(500),
        }
    }
}

/// Ping every host address (and the broadcast address) of `subnet` to populate
/// the OS neighbor cache. Individual failures are ignored; the sweep returns
/// once every ping finished or `overall` elapsed.
pub async fn sweep(subnet: Ipv4Net, opts: &SweepOptions) {
    let hosts = expand_cidr_to_ips(subnet);
    info!("Pinging {} hosts on {subnet} to discover live devices...", hosts.len());

    let sem = Arc::new(Semaphore::new(opts.concurrency.clamp(1, 1_024)));
    let mut set = JoinSet::new();

    set.spawn(ping_once(subnet.broadcast(), opts.per_host, true));
    for ip in hosts {
        let sem = sem.clone();
        let per_host = opts.per_host;
        set.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            ping_once(ip, per_host, false).await;
        });
    }

    let drained = time::timeout(opts.overall, async {
        while set.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        debug!(%subnet, "sweep bounded by timeout, abandoning outstanding pings");
        set.abort_all();
    }
    time::sleep(opts.settle).await;
}

async fn ping_once(ip: Ipv4Addr, wait: Duration, broadcast: bool) {
    let mut cmd = process::command("ping");
    cmd.args(ping_args(ip, wait, broadcast));
    // Allow a little slack over the ping's own deadline.
    let _ = process::run(cmd, wait + Duration::from_millis(500)).await;
}

/// Platform-specific arguments for a single echo request.
pub fn ping_args(ip: Ipv4Addr, wait: Duration, broadcast: bool) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if cfg!(target_os = "windows") {
        args.extend(["-n", "1", "-w"].map(String::from));
        args.push(wait.as_millis().to_string());
    } else if cfg!(target_os = "macos") {
        args.extend(["-c", "1", "-W"].map(String::from));
        args.push(wait.as_millis().to_string());
    } else {
        // Linux iputils takes whole seconds.
        args.extend(["-c", "1", "-W"].map(String::from));
        args.push(wait.as_secs().max(1).to_string());
        if broadcast {
            args.push("-b".into());
        }
    }
    args.push(ip.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_args_end_with_target() {
        let args = ping_args(Ipv4Addr::new(192, 168, 0, 9), Duration::from_millis(300), false);
        assert_eq!(args.last().map(String::as_str), Some("192.168.0.9"));
        assert!(args.contains(&"1".to_string()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_broadcast_sets_flag_and_rounds_wait_up() {
        let args = ping_args(Ipv4Addr::new(192, 168, 0, 255), Duration::from_millis(300), true);
        assert_eq!(args, vec!["-c", "1", "-W", "1", "-b", "192.168.0.255"]);
    }
}
