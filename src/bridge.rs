//! Process boundary to the external debugging-bridge executable (`adb`).

use async_trait::async_trait;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::ConnectError;
use crate::process::{self, CommandOutput, RunError};
use crate::types::{AttachedDevice, DeviceInfo, DeviceState};

/// Operations the connector needs from the debugging bridge.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Restart the bridge server so stale transports are dropped.
    async fn restart_server(&self) -> Result<(), ConnectError>;

    /// Devices currently attached or connected.
    async fn devices(&self) -> Result<Vec<AttachedDevice>, ConnectError>;

    /// Connect to a wireless endpoint and confirm it shows up as a ready device.
    async fn connect(&self, endpoint: SocketAddrV4) -> Result<bool, ConnectError>;

    async fn disconnect(&self, endpoint: SocketAddrV4) -> Result<(), ConnectError>;

    /// Run a device shell command and return its trimmed stdout.
    async fn shell(&self, serial: &str, args: &[&str]) -> Result<String, ConnectError>;
}

/// Query model, manufacturer, OS version and user-visible name.
///
/// Individual property failures leave the field empty.
pub async fn device_info<B: Bridge + ?Sized>(bridge: &B, serial: &str) -> DeviceInfo {
    async fn prop<B: Bridge + ?Sized>(bridge: &B, serial: &str, args: &[&str]) -> String {
        match bridge.shell(serial, args).await {
            Ok(v) => v,
            Err(e) => {
                debug!(serial, ?args, "property query failed: {e}");
                String::new()
            }
        }
    }

    let info = DeviceInfo {
        model: prop(bridge, serial, &["getprop", "ro.product.model"]).await,
        manufacturer: prop(bridge, serial, &["getprop", "ro.product.manufacturer"]).await,
        android_version: prop(bridge, serial, &["getprop", "ro.build.version.release"]).await,
        device_name: prop(bridge, serial, &["settings", "get", "global", "device_name"]).await,
    };
    info!(
        "Device: {} {} (Android {}, name {:?})",
        info.manufacturer, info.model, info.android_version, info.device_name
    );
    info
}

/// Parse `adb devices` output into rows, skipping the header and daemon chatter.
pub fn parse_devices(stdout: &str) -> Vec<AttachedDevice> {
    stdout
        .lines()
        .filter(|l| !l.starts_with("List of devices") && !l.starts_with('*'))
        .filter_map(|l| {
            let mut cols = l.split_whitespace();
            let serial = cols.next()?;
            let state = cols.next()?;
            Some(AttachedDevice { serial: serial.to_string(), state: DeviceState::from(state) })
        })
        .collect()
}

/// `adb connect` reports success as "connected to" or "already connected to".
pub fn connect_reported_success(stdout: &str) -> bool {
    let s = stdout.to_ascii_lowercase();
    s.contains("connected") && !s.contains("failed") && !s.contains("unable")
}

/// [`Bridge`] that invokes the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    pub path: PathBuf,
    /// Bound for `connect`.
    pub handshake_timeout: Duration,
    /// Bound for every other command.
    pub command_timeout: Duration,
    /// Wait between a reported connect and the `devices` check.
    pub verify_delay: Duration,
}

impl AdbBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handshake_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            verify_delay: Duration::from_secs(1),
        }
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, ConnectError> {
        let mut cmd = process::command(&self.path);
        cmd.args(args);
        debug!("Running: {} {}", self.path.display(), args.join(" "));
        match process::run(cmd, timeout).await {
            Ok(out) => Ok(out),
            Err(RunError::TimedOut) => {
                warn!("Command timed out: adb {}", args.join(" "));
                Err(ConnectError::HandshakeTimeout { command: format!("adb {}", args.join(" ")) })
            }
            Err(RunError::Spawn(e)) => Err(ConnectError::Bridge(format!(
                "failed to run {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    async fn restart_server(&self) -> Result<(), ConnectError> {
        // kill-server fails when no server runs; that is fine.
        let _ = self.run(&["kill-server"], self.command_timeout).await;
        time::sleep(Duration::from_secs(1)).await;
        let out = self.run(&["start-server"], self.command_timeout).await?;
        if !out.success {
            return Err(ConnectError::Bridge(format!("start-server failed: {}", out.stderr.trim())));
        }
        time::sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<AttachedDevice>, ConnectError> {
        let out = self.run(&["devices"], self.command_timeout).await?;
        Ok(parse_devices(&out.stdout))
    }

    async fn connect(&self, endpoint: SocketAddrV4) -> Result<bool, ConnectError> {
        let address = endpoint.to_string();
        debug!("Trying {address}...");
        let out = self.run(&["connect", address.as_str()], self.handshake_timeout).await?;
        if !connect_reported_success(&out.stdout) {
            return Ok(false);
        }
        time::sleep(self.verify_delay).await;
        let devices = self.devices().await?;
        let ok = devices.iter().any(|d| d.serial == address && d.is_ready());
        if ok {
            info!("[OK] Connected to {address}");
        }
        Ok(ok)
    }

    async fn disconnect(&self, endpoint: SocketAddrV4) -> Result<(), ConnectError> {
        let address = endpoint.to_string();
        self.run(&["disconnect", address.as_str()], self.command_timeout).await?;
        Ok(())
    }

    async fn shell(&self, serial: &str, args: &[&str]) -> Result<String, ConnectError> {
        let mut full = vec!["-s", serial, "shell"];
        full.extend_from_slice(args);
        let out = self.run(&full, self.command_timeout).await?;
        if !out.success {
            return Err(ConnectError::Bridge(out.stderr.trim().to_string()));
        }
        Ok(out.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_listing() {
        let out = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
7c3f9a2e\tdevice
192.168.0.5:43449\toffline
emulator-5554\tunauthorized

";
        let devs = parse_devices(out);
        assert_eq!(devs.len(), 3);
        assert_eq!(devs[0].serial, "7c3f9a2e");
        assert!(devs[0].is_ready());
        assert_eq!(devs[1].state, DeviceState::Offline);
        assert_eq!(devs[2].state, DeviceState::Unauthorized);
    }

    #[test]
    fn connect_output_classification() {
        assert!(connect_reported_success("connected to 192.168.0.5:43449\n"));
        assert!(connect_reported_success("already connected to 192.168.0.5:43449\n"));
        assert!(!connect_reported_success(
            "failed to connect to '192.168.0.5:36019': Connection refused\n"
        ));
        assert!(!connect_reported_success("cannot connect to 192.168.0.5:1: No route to host"));
    }
}
