use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::utils::current_timestamp_ms;

/// Host-visible "service is running" signal, shown before the sensor starts
/// and hidden after everything else has stopped.
pub trait RunningIndicator: Send + Sync {
    fn show(&self) -> io::Result<()>;
    fn hide(&self);
}

/// Indication through the log only.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl RunningIndicator for LogIndicator {
    fn show(&self) -> io::Result<()> {
        info!("Service active: collecting accelerometer data");
        Ok(())
    }

    fn hide(&self) {
        info!("Service inactive");
    }
}

#[derive(Debug, Serialize)]
struct StatusRecord {
    pid: u32,
    started_at: i64,
    state: &'static str,
}

/// JSON status file that exists exactly while the service runs, for process
/// supervisors and status bars to poll.
#[derive(Debug)]
pub struct StatusFileIndicator {
    path: PathBuf,
}

impl StatusFileIndicator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunningIndicator for StatusFileIndicator {
    fn show(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let record = StatusRecord {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
            state: "running",
        };
        let content = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;
        fs::write(&self.path, content)?;
        info!("Status file written to {}", self.path.display());
        Ok(())
    }

    fn hide(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Status file {} removed", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove status file {}: {}", self.path.display(), e),
        }
    }
}
