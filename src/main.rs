use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use droidlink::config::ConnectorConfig;
use droidlink::connector::SystemConnector;
use droidlink::types::ConnectedSession;
use droidlink::{logging, mirror, ports};

/// droidlink: find an Android phone over USB or Wi-Fi, connect adb and launch mirroring.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "droidlink",
    version,
    about = "Find an Android phone over USB or Wi-Fi, connect adb and launch screen mirroring.",
    long_about = None
)]
struct Cli {
    /// Connection cache file. Defaults to the per-user data directory.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Debugging-bridge executable. Defaults to `adb` on PATH.
    #[arg(long)]
    adb: Option<PathBuf>,

    /// Common-ports file (one port or range per line) tried before deep scans.
    #[arg(long)]
    ports: Option<PathBuf>,

    /// Deep-scan port range, e.g. 30000-65535.
    #[arg(long = "deep-range")]
    deep_range: Option<String>,

    /// Max concurrent port probes.
    #[arg(long, default_value_t = 64)]
    concurrency: usize,

    /// TCP connect timeout in milliseconds for the cheap port filter.
    #[arg(long = "timeout-ms", default_value_t = 200)]
    timeout_ms: u64,

    /// Also deep scan hosts whose MAC vendor is not a known phone maker.
    #[arg(long = "deep-scan-all", default_value_t = false)]
    deep_scan_all: bool,

    /// Do not restart the adb server before checking USB.
    #[arg(long = "no-restart", default_value_t = false)]
    no_restart: bool,

    /// Append log output to this file.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Connect only; do not launch screen mirroring.
    #[arg(long = "no-mirror", default_value_t = false)]
    no_mirror: bool,

    /// Screen-mirroring executable.
    #[arg(long = "mirror-exe", default_value = "scrcpy")]
    mirror_exe: PathBuf,

    /// Arguments for the mirroring executable (after `--`).
    #[arg(last = true)]
    mirror_args: Vec<String>,
}

impl Cli {
    fn to_config(&self) -> Result<ConnectorConfig> {
        let mut config = ConnectorConfig::default();
        if let Some(p) = &self.cache {
            config.cache_path = p.clone();
        }
        if let Some(p) = &self.adb {
            config.adb_path = p.clone();
        }
        if let Some(p) = &self.ports {
            let list = ports::load_ports_from_path(p)?;
            if !list.is_empty() {
                config.common_ports = list;
            }
        }
        if let Some(r) = &self.deep_range {
            config.deep_scan_ports = ports::parse_port_spec(r)?;
        }
        config.concurrency = self.concurrency;
        config.tcp_timeout = Duration::from_millis(self.timeout_ms);
        config.deep_scan_unknown = self.deep_scan_all;
        config.restart_server = !self.no_restart;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = match logging::init(cli.log_file.as_deref(), cli.verbose) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e:#}");
            None
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.to_config()?;
    info!("droidlink configuration:");
    info!("  cache        : {}", config.cache_path.display());
    info!("  adb          : {}", config.adb_path.display());
    info!("  common ports : {:?}", config.common_ports);
    info!("  deep scan    : {} ports", config.deep_scan_ports.len());
    info!("  concurrency  : {}", config.concurrency);
    info!("  timeout_ms   : {}", config.tcp_timeout.as_millis());

    let connector = SystemConnector::from_config(config);
    let session = match connector.connect().await {
        Ok(s) => s,
        Err(_) => return Ok(ExitCode::FAILURE),
    };
    print_session(&session);

    if cli.no_mirror {
        return Ok(ExitCode::SUCCESS);
    }
    let status = mirror::launch(&cli.mirror_exe, &session.transport.serial(), &cli.mirror_args).await?;
    Ok(if status.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_session(session: &ConnectedSession) {
    info!("[SUCCESS] PHONE CONNECTED");
    info!("  serial       : {}", session.transport.serial());
    info!(
        "  device       : {} {} (Android {})",
        session.device.manufacturer, session.device.model, session.device.android_version
    );
    if let Some(rec) = &session.record {
        match serde_json::to_string(rec) {
            Ok(json) => info!("  cache        : {json}"),
            Err(e) => error!("Failed to render cache record: {e}"),
        }
    }
}
