//! Emulator Launcher
//!
//! Creates the AVD for the configured Android version, launches the
//! emulator in the background and tracks it through the device status file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, debug};

use emuctl_android_toolchain::AndroidVersion;
use emuctl_core::status::write_status;
use emuctl_core::{CommandRunner, CommandSpec, DeviceStatus, EmuError, Result, Settings};

use crate::adb::AdbClient;
use crate::avd::{AvdConfig, AvdManager};
use crate::device::Device;

/// How long to wait for a freshly spawned emulator to show up in adb
pub const DEFAULT_APPEAR_TIMEOUT: Duration = Duration::from_secs(120);

/// How long to wait for Android to finish booting
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(600);

/// Emulator launch options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorOptions {
    /// AVD to boot
    pub avd_name: String,
    /// Start without a device skin
    pub no_skin: bool,
    /// Additional arguments
    pub extra_args: Vec<String>,
}

impl EmulatorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            avd_name: settings.name.clone(),
            no_skin: settings.no_skin,
            extra_args: settings.additional_args.clone(),
        }
    }

    /// Convert to command line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-avd".to_string(), self.avd_name.clone()];

        if self.no_skin {
            args.push("-no-skin".to_string());
        }

        args.extend(self.extra_args.clone());
        args
    }
}

/// A running emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorInstance {
    pub avd_name: String,
    pub serial: String,
}

/// Emulator launcher
pub struct EmulatorLauncher {
    runner: Arc<dyn CommandRunner>,
    adb: AdbClient,
    avd: AvdManager,
    emulator_path: PathBuf,
    appear_timeout: Duration,
    boot_timeout: Duration,
    poll_interval: Duration,
}

impl EmulatorLauncher {
    /// Create a new emulator launcher
    pub fn new(runner: Arc<dyn CommandRunner>, sdk_path: &Path) -> Self {
        Self {
            adb: AdbClient::new(runner.clone(), sdk_path),
            avd: AvdManager::new(runner.clone(), sdk_path),
            emulator_path: Self::find_emulator(sdk_path),
            runner,
            appear_timeout: DEFAULT_APPEAR_TIMEOUT,
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_avd_manager(mut self, avd: AvdManager) -> Self {
        self.avd = avd;
        self
    }

    pub fn with_timeouts(mut self, appear: Duration, boot: Duration, poll: Duration) -> Self {
        self.appear_timeout = appear;
        self.boot_timeout = boot;
        self.poll_interval = poll;
        self
    }

    fn find_emulator(sdk_path: &Path) -> PathBuf {
        let exe_name = if cfg!(windows) { "emulator.exe" } else { "emulator" };
        let path = sdk_path.join("emulator").join(exe_name);
        if path.exists() {
            path
        } else {
            PathBuf::from(exe_name)
        }
    }

    pub fn adb(&self) -> &AdbClient {
        &self.adb
    }

    /// Create the AVD for the configured version and launch it
    pub async fn start(&self, settings: &Settings) -> Result<EmulatorInstance> {
        let version = settings
            .android_version
            .as_deref()
            .ok_or_else(|| EmuError::Settings("No Android version configured".into()))?;
        let api = AndroidVersion::parse(version)?.require_api_level()?;

        write_status(&settings.work_path, DeviceStatus::Creating).await?;
        self.avd
            .create_avd(&AvdConfig::from_settings(settings, api))
            .await?;

        let before = self.adb.emulators().await?;

        write_status(&settings.work_path, DeviceStatus::Starting).await?;
        let options = EmulatorOptions::from_settings(settings);
        let spec = CommandSpec::new(self.emulator_path.to_string_lossy()).args(options.to_args());
        self.runner.spawn(&spec).await?;

        write_status(&settings.work_path, DeviceStatus::Booting).await?;
        let serial = self.wait_for_new_emulator(&before).await?;

        info!("Emulator {} started as {}", options.avd_name, serial);
        Ok(EmulatorInstance {
            avd_name: options.avd_name,
            serial,
        })
    }

    /// Poll adb until an emulator that was not running before the launch is listed
    async fn wait_for_new_emulator(&self, before: &[Device]) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.appear_timeout;

        loop {
            let emulators = self.adb.emulators().await?;
            if let Some(device) = emulators.into_iter().find(|d| is_new_emulator(d, before)) {
                return Ok(device.serial);
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(EmuError::Timeout(format!(
                    "emulator did not appear in adb within {:?}",
                    self.appear_timeout
                )));
            }
            debug!("Waiting for the emulator to register with adb...");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for boot to complete, then mark the device ready
    pub async fn wait_until_ready(&self, instance: &EmulatorInstance, work_path: &Path) -> Result<()> {
        self.adb
            .wait_for_boot(&instance.serial, self.boot_timeout, self.poll_interval)
            .await?;
        write_status(work_path, DeviceStatus::Ready).await?;

        info!("Emulator {} is ready", instance.serial);
        Ok(())
    }
}

/// A serial absent before launch is new. A serial that was listed but not
/// online belongs to a stopped emulator; it counts once it comes back online,
/// since the emulator reuses the freed console port.
fn is_new_emulator(device: &Device, before: &[Device]) -> bool {
    match before.iter().find(|b| b.serial == device.serial) {
        None => true,
        Some(old) => !old.is_online() && device.is_online(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuctl_core::process::testing::ScriptedRunner;
    use emuctl_core::status::read_status;
    use emuctl_core::{CommandOutput, StoredSettings};

    fn settings(work: &Path) -> Settings {
        let mut settings = Settings::resolve(StoredSettings::default(), |_| None);
        settings.android_version = Some("14.0".into());
        settings.work_path = work.to_path_buf();
        settings.no_skin = true;
        settings.additional_args = vec!["-gpu".into(), "swiftshader_indirect".into()];
        settings
    }

    fn launcher(runner: Arc<ScriptedRunner>, avd_home: &Path) -> EmulatorLauncher {
        let sdk = Path::new("/nonexistent/sdk");
        EmulatorLauncher::new(runner.clone(), sdk)
            .with_avd_manager(AvdManager::new(runner, sdk).with_avd_home(avd_home.to_path_buf()))
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(50), Duration::from_millis(1))
    }

    #[test]
    fn test_options_to_args() {
        let dir = tempfile::tempdir().unwrap();
        let options = EmulatorOptions::from_settings(&settings(dir.path()));
        assert_eq!(
            options.to_args(),
            vec!["-avd", "emuctl", "-no-skin", "-gpu", "swiftshader_indirect"]
        );
    }

    #[tokio::test]
    async fn test_start_waits_for_new_serial() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("devices", CommandOutput::success("List of devices attached\nemulator-5554 device\n"))
                .on("devices", CommandOutput::success("List of devices attached\nemulator-5554 device\n"))
                .on(
                    "devices",
                    CommandOutput::success("List of devices attached\nemulator-5554 device\nemulator-5556 offline\n"),
                ),
        );
        let launcher = launcher(runner.clone(), work.path());

        let instance = launcher.start(&settings(work.path())).await.unwrap();

        assert_eq!(instance.serial, "emulator-5556");
        assert_eq!(
            runner.spawned(),
            vec!["emulator -avd emuctl -no-skin -gpu swiftshader_indirect"]
        );
        assert!(runner.position("avdmanager create avd").unwrap() < runner.position("emulator -avd").unwrap());
        assert_eq!(read_status(work.path()).await.unwrap(), Some(DeviceStatus::Booting));
    }

    #[tokio::test]
    async fn test_start_accepts_reused_serial() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                // the stopped emulator is still listed while the new one launches
                .on("devices", CommandOutput::success("List of devices attached\nemulator-5554 offline\n"))
                .on("devices", CommandOutput::success("List of devices attached\nemulator-5554 offline\n"))
                .on("devices", CommandOutput::success("List of devices attached\nemulator-5554 device\n")),
        );

        let instance = launcher(runner.clone(), work.path())
            .start(&settings(work.path()))
            .await
            .unwrap();

        assert_eq!(instance.serial, "emulator-5554");
        assert_eq!(runner.spawned().len(), 1);
    }

    #[tokio::test]
    async fn test_start_ignores_already_running_emulator() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("devices", CommandOutput::success("List of devices attached\nemulator-5554 device\n")),
        );

        let err = launcher(runner, work.path())
            .start(&settings(work.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, EmuError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_start_times_out_without_device() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("devices", CommandOutput::success("List of devices attached\n")),
        );

        let err = launcher(runner, work.path())
            .start(&settings(work.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, EmuError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_start_requires_version() {
        let work = tempfile::tempdir().unwrap();
        let mut settings = settings(work.path());
        settings.android_version = None;

        let err = launcher(Arc::new(ScriptedRunner::new()), work.path())
            .start(&settings)
            .await
            .unwrap_err();
        assert!(matches!(err, EmuError::Settings(_)));
    }

    #[tokio::test]
    async fn test_wait_until_ready_writes_status() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("sys.boot_completed", CommandOutput::success("1")),
        );
        let instance = EmulatorInstance {
            avd_name: "emuctl".into(),
            serial: "emulator-5554".into(),
        };

        launcher(runner, work.path())
            .wait_until_ready(&instance, work.path())
            .await
            .unwrap();
        assert_eq!(read_status(work.path()).await.unwrap(), Some(DeviceStatus::Ready));
    }
}
