//! One overview at a time.
//!
//! `serve` records its PID in the runtime directory. A second overview
//! refuses to start while that PID is alive; a PID left by a crashed or
//! killed session is taken over.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Held for the lifetime of a serving session; removes the pidfile on drop
pub struct SessionPidfile {
    path: PathBuf,
}

impl SessionPidfile {
    /// Claim the pidfile for this process, failing if a live session owns it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(pid) = live_session_pid(path) {
            anyhow::bail!(
                "An overview is already open (PID {}). \
                 If it is not, remove {}",
                pid,
                path.display()
            );
        }

        let pid = std::process::id();
        fs::write(path, pid.to_string())
            .with_context(|| format!("Failed to write pidfile {}", path.display()))?;
        debug!("Overview session {} recorded in {}", pid, path.display());

        Ok(SessionPidfile {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for SessionPidfile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("Failed to remove pidfile {}: {}", self.path.display(), e);
        }
    }
}

/// PID of a running session recorded at `path`, if any.
///
/// Unreadable or stale pidfiles are removed so the caller can take over.
fn live_session_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;

    match contents.trim().parse::<u32>() {
        Ok(pid) if process_exists(pid) => return Some(pid),
        Ok(pid) => info!("Previous overview session {} is gone, taking over", pid),
        Err(_) => warn!("Ignoring unreadable pidfile {}", path.display()),
    }

    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove stale pidfile: {}", e);
    }
    None
}

/// Check if a process with the given PID exists
fn process_exists(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{}", pid)).exists()
}
