//! Version manager
//!
//! Installs Android versions and moves a running emulator from one version
//! to another, carrying app data across with `adb backup` / `adb restore`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use emuctl_android_toolchain::{AndroidVersion, InstallOutcome, SdkManager};
use emuctl_core::{CommandRunner, EmuError, Result, Settings};
use emuctl_emulator_bridge::{AdbClient, EmulatorInstance, EmulatorLauncher, DEFAULT_DATA_DIR};

/// Result of an upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The requested version is already the configured one
    AlreadyCurrent,
    /// The emulator now runs the requested version
    Upgraded { from: String, to: EmulatorInstance },
}

/// Coordinates sdkmanager, adb and the emulator launcher
pub struct VersionManager {
    settings: Settings,
    sdk: SdkManager,
    launcher: EmulatorLauncher,
}

impl VersionManager {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: Settings) -> Self {
        let sdk = SdkManager::new(runner.clone(), settings.sdk_root.clone())
            .with_sudo(settings.use_sudo);
        let launcher = EmulatorLauncher::new(runner, &settings.sdk_root);

        Self {
            settings,
            sdk,
            launcher,
        }
    }

    /// Replace the launcher (timeouts, AVD home)
    pub fn with_launcher(mut self, launcher: EmulatorLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn adb(&self) -> &AdbClient {
        self.launcher.adb()
    }

    /// Backup file used while upgrading to `version`
    pub fn backup_path(&self, version: &AndroidVersion) -> PathBuf {
        self.settings
            .work_path
            .join(format!("backup_emulator_{}.ab", version))
    }

    /// Installed Android versions
    pub async fn list_installed(&self) -> Result<Vec<AndroidVersion>> {
        let versions = self.sdk.installed_android_versions().await?;
        let names: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        info!("Installed Android versions: {:?}", names);
        Ok(versions)
    }

    /// Download platform and system image for a version
    pub async fn install(&self, version: &str) -> Result<InstallOutcome> {
        let version = AndroidVersion::parse(version)?;
        self.sdk
            .install_android_version(&version, &self.settings.img_type, &self.settings.sys_img)
            .await
    }

    fn is_current(&self, version: &AndroidVersion) -> bool {
        self.settings
            .android_version
            .as_deref()
            .and_then(|current| AndroidVersion::parse(current).ok())
            .is_some_and(|current| &current == version)
    }

    /// Serial of the running emulator, booting one if none is up
    async fn running_or_started(&self) -> Result<String> {
        if let Some(serial) = self.adb().first_emulator().await? {
            return Ok(serial);
        }

        warn!("No emulator is running! Starting one...");
        let instance = self.launcher.start(&self.settings).await?;
        self.launcher
            .wait_until_ready(&instance, &self.settings.work_path)
            .await?;
        Ok(instance.serial)
    }

    /// Switch the emulator to another installed Android version
    pub async fn upgrade(&mut self, version: &str) -> Result<UpgradeOutcome> {
        let version = AndroidVersion::parse(version)?;

        let installed = self.sdk.installed_android_versions().await?;
        if !installed.contains(&version) {
            return Err(EmuError::NotInstalled(version.to_string()));
        }

        if self.is_current(&version) {
            info!("Android {} is already the current version!", version);
            return Ok(UpgradeOutcome::AlreadyCurrent);
        }

        let old_serial = self.running_or_started().await?;

        self.settings.ensure_work_path().await?;
        let backup = self.backup_path(&version);
        self.adb().backup_all(&old_serial, &backup).await?;
        self.adb().kill_emulator(&old_serial).await?;

        info!("Upgrading Android {}...", version);
        self.settings.set_android_version(version.as_str()).await?;

        let instance = self.launcher.start(&self.settings).await?;
        self.launcher
            .wait_until_ready(&instance, &self.settings.work_path)
            .await?;
        self.adb().restore(&instance.serial, &backup).await?;

        info!("Android {} is upgraded!", version);
        Ok(UpgradeOutcome::Upgraded {
            from: old_serial,
            to: instance,
        })
    }

    /// Resolve an explicit serial or fall back to the first emulator
    pub async fn target_serial(&self, serial: Option<&str>) -> Result<String> {
        match serial {
            Some(serial) => Ok(serial.to_string()),
            None => self.adb().first_emulator().await?.ok_or(EmuError::NoDevice),
        }
    }

    fn default_backup_path(&self) -> PathBuf {
        let label = self.settings.android_version.as_deref().unwrap_or("current");
        self.settings
            .work_path
            .join(format!("backup_emulator_{}.ab", label))
    }

    /// `adb backup -all` of a device
    pub async fn backup(&self, serial: Option<&str>, path: Option<PathBuf>) -> Result<PathBuf> {
        let serial = self.target_serial(serial).await?;
        self.settings.ensure_work_path().await?;
        let path = path.unwrap_or_else(|| self.default_backup_path());

        self.adb().backup_all(&serial, &path).await?;
        Ok(path)
    }

    /// `adb restore` onto a device, deleting the backup afterwards
    pub async fn restore(&self, serial: Option<&str>, path: Option<PathBuf>) -> Result<()> {
        let serial = self.target_serial(serial).await?;
        let path = path.unwrap_or_else(|| self.default_backup_path());
        if !path.exists() {
            return Err(EmuError::NotFound(path));
        }

        self.adb().restore(&serial, &path).await
    }

    /// Copy a device directory (default `/data/data`) to the host
    pub async fn backup_data_dir(
        &self,
        serial: Option<&str>,
        local: &Path,
        data_dir: Option<&str>,
    ) -> Result<()> {
        let serial = self.target_serial(serial).await?;
        self.adb()
            .pull(&serial, data_dir.unwrap_or(DEFAULT_DATA_DIR), local)
            .await
    }

    /// Copy a host directory back onto the device
    pub async fn restore_data_dir(
        &self,
        serial: Option<&str>,
        local: &Path,
        data_dir: Option<&str>,
    ) -> Result<()> {
        let serial = self.target_serial(serial).await?;
        self.adb()
            .push(&serial, local, data_dir.unwrap_or(DEFAULT_DATA_DIR))
            .await
    }

    /// Stop an emulator, returning its serial
    pub async fn stop(&self, serial: Option<&str>) -> Result<String> {
        let serial = self.target_serial(serial).await?;
        self.adb().kill_emulator(&serial).await?;
        Ok(serial)
    }
}
