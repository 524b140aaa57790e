//! Device status file
//!
//! The current lifecycle phase of the emulator is written as a single word
//! to `<work_path>/device_status` so that outside tooling can poll it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::{EmuError, Result};

/// File name of the status file inside the work directory
pub const STATUS_FILE: &str = "device_status";

/// Emulator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Creating,
    Starting,
    Booting,
    Ready,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Creating => "CREATING",
            DeviceStatus::Starting => "STARTING",
            DeviceStatus::Booting => "BOOTING",
            DeviceStatus::Ready => "READY",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "CREATING" => Ok(DeviceStatus::Creating),
            "STARTING" => Ok(DeviceStatus::Starting),
            "BOOTING" => Ok(DeviceStatus::Booting),
            "READY" => Ok(DeviceStatus::Ready),
            other => Err(EmuError::Settings(format!("Unknown device status: {}", other))),
        }
    }
}

/// Path of the status file
pub fn status_path(work_path: &Path) -> PathBuf {
    work_path.join(STATUS_FILE)
}

/// Write the current status, replacing the previous one
pub async fn write_status(work_path: &Path, status: DeviceStatus) -> Result<()> {
    tokio::fs::create_dir_all(work_path).await?;
    let path = status_path(work_path);
    tokio::fs::write(&path, status.as_str()).await?;
    debug!("Device status {} written to {:?}", status, path);
    Ok(())
}

/// Read the last written status, `None` if nothing was written yet
pub async fn read_status(work_path: &Path) -> Result<Option<DeviceStatus>> {
    match tokio::fs::read_to_string(status_path(work_path)).await {
        Ok(contents) => contents.parse().map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
