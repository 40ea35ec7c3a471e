use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitStatus;
use tracing::info;

use crate::process;

/// Options passed when the user gives none.
pub const DEFAULT_MIRROR_ARGS: &[&str] = &["--stay-awake", "--power-off-on-close"];

/// Launch the screen-mirroring executable against `serial` and wait for it to exit.
pub async fn launch(exe: &Path, serial: &str, args: &[String]) -> Result<ExitStatus> {
    let mut cmd = process::command(exe);
    cmd.arg("--serial").arg(serial);
    if args.is_empty() {
        cmd.args(DEFAULT_MIRROR_ARGS);
    } else {
        cmd.args(args);
    }
    info!("Launching {} for {serial}...", exe.display());
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to launch {}", exe.display()))?;
    let status = child.wait().await.context("mirroring process wait failed")?;
    info!("Mirroring exited: {status}");
    Ok(status)
}
