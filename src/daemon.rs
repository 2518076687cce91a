//! Process lifecycle for `octofeed run`.
//!
//! A running poller owns a PID file and turns SIGINT/SIGTERM into a
//! cancellation of the scheduler's shutdown token. `octofeed stop` and
//! `octofeed status` work from the PID file alone.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::app::{OctofeedError, Result};

/// PID file held for the lifetime of a running poller. Removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Get the default PID file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("octofeed").join("octofeed.pid"))
    }

    /// Writes the current process id to `path`, refusing if another live
    /// process already holds it. A stale file is overwritten.
    ///
    /// Both `run` and `once` hold the file while cycling, so the two never
    /// deliver from the same database at once.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(pid) = read_pid(path) {
            if process_exists(pid) {
                return Err(OctofeedError::AlreadyRunning(pid));
            }
            tracing::debug!(pid, path = %path.display(), "Replacing stale PID file");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Cancels `shutdown` on the first SIGINT or SIGTERM (Ctrl-C on Windows).
pub fn cancel_on_signal(shutdown: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
                _ = shutdown.cancelled() => return,
            }
            shutdown.cancel();
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C"),
                _ = shutdown.cancelled() => return,
            }
            shutdown.cancel();
        });
    }

    Ok(())
}

/// Stop a running poller by signalling the process in the PID file
pub fn stop_daemon(pid_path: &Path) -> Result<u32> {
    if !pid_path.exists() {
        return Err(OctofeedError::Other(
            "No poller is running (PID file not found)".to_string(),
        ));
    }
    let pid = read_pid(pid_path)
        .ok_or_else(|| OctofeedError::Other("Invalid PID in PID file".to_string()))?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        let _ = fs::remove_file(pid_path);
        Ok(pid)
    } else {
        Err(OctofeedError::Other(format!(
            "Failed to stop poller (PID {})",
            pid
        )))
    }
}

/// Check poller status
pub fn daemon_status(pid_path: &Path) -> String {
    match read_pid(pid_path) {
        Some(pid) if process_exists(pid) => format!("Poller is running (PID: {})", pid),
        Some(_) => "Poller is not running (stale PID file)".to_string(),
        None => "Poller is not running".to_string(),
    }
}
