//! CLI commands for emuctl
//!
//! Each command wraps one [`VersionManager`] operation and reports the
//! result on stdout.

use std::path::PathBuf;
use tracing::info;

use emuctl_android_toolchain::InstallOutcome;
use emuctl_core::Result;

use crate::version_manager::{UpgradeOutcome, VersionManager};

/// List installed Android versions
pub struct ListInstalledCommand {
    pub json: bool,
}

impl ListInstalledCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        let versions = manager.list_installed().await?;

        if self.json {
            println!("{}", serde_json::to_string(&versions)?);
        } else if versions.is_empty() {
            println!("No Android versions installed");
        } else {
            println!("Installed Android versions:");
            for version in versions {
                let api = version.api_level().unwrap_or_default();
                println!("  {} (API {})", version, api);
            }
        }

        Ok(())
    }
}

/// Install an Android version
pub struct InstallCommand {
    pub version: String,
}

impl InstallCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        match manager.install(&self.version).await? {
            InstallOutcome::Installed => println!("Installed Android {}", self.version),
            InstallOutcome::AlreadyInstalled => println!("Android {} is already installed", self.version),
        }
        Ok(())
    }
}

/// Move the emulator to another Android version
pub struct UpgradeCommand {
    pub version: String,
}

impl UpgradeCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        match manager.upgrade(&self.version).await? {
            UpgradeOutcome::AlreadyCurrent => {
                println!("Android {} is already the current version", self.version);
            }
            UpgradeOutcome::Upgraded { from, to } => {
                println!("Upgraded {} -> {} (Android {})", from, to.serial, self.version);
            }
        }
        Ok(())
    }
}

/// Back up a device, either as an adb backup or by pulling a directory
pub struct BackupCommand {
    pub serial: Option<String>,
    pub path: Option<PathBuf>,
    pub data_dir: Option<String>,
}

impl BackupCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        let serial = self.serial.as_deref();

        match &self.data_dir {
            Some(data_dir) => {
                let local = self
                    .path
                    .clone()
                    .unwrap_or_else(|| manager.settings().work_path.join("data_backup"));
                manager.backup_data_dir(serial, &local, Some(data_dir)).await?;
                println!("Pulled {} to {}", data_dir, local.display());
            }
            None => {
                let written = manager.backup(serial, self.path.clone()).await?;
                info!("Backup written to {:?}", written);
                println!("Backup written to {}", written.display());
            }
        }
        Ok(())
    }
}

/// Restore a device from a backup
pub struct RestoreCommand {
    pub serial: Option<String>,
    pub path: Option<PathBuf>,
    pub data_dir: Option<String>,
}

impl RestoreCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        let serial = self.serial.as_deref();

        match &self.data_dir {
            Some(data_dir) => {
                let local = self
                    .path
                    .clone()
                    .unwrap_or_else(|| manager.settings().work_path.join("data_backup"));
                manager.restore_data_dir(serial, &local, Some(data_dir)).await?;
                println!("Pushed {} to {}", local.display(), data_dir);
            }
            None => {
                manager.restore(serial, self.path.clone()).await?;
                println!("Restore complete");
            }
        }
        Ok(())
    }
}

/// Stop a running emulator
pub struct StopCommand {
    pub serial: Option<String>,
}

impl StopCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        let serial = manager.stop(self.serial.as_deref()).await?;
        println!("Stopped {}", serial);
        Ok(())
    }
}

/// Serve the log directory over HTTP
pub struct ShareLogCommand;

impl ShareLogCommand {
    pub async fn execute(&self, manager: &mut VersionManager) -> Result<()> {
        emuctl_log_share::share_logs(manager.settings()).await
    }
}
