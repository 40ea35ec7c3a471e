use std::ffi::OsStr;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Create a Command that hides the console window on Windows.
pub fn command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd.kill_on_drop(true);
    cmd
}

#[derive(Debug)]
pub enum RunError {
    Spawn(io::Error),
    TimedOut,
}

/// Captured output of a finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(o: Output) -> Self {
        Self {
            success: o.status.success(),
            stdout: String::from_utf8_lossy(&o.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&o.stderr).into_owned(),
        }
    }
}

/// Run to completion, capturing output. The child is killed if the timeout fires.
pub async fn run(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, RunError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    match time::timeout(timeout, cmd.output()).await {
        Ok(Ok(out)) => Ok(out.into()),
        Ok(Err(e)) => Err(RunError::Spawn(e)),
        Err(_) => Err(RunError::TimedOut),
    }
}
