//! ADB (Android Debug Bridge) Client
//!
//! Communicates with devices via ADB: device discovery, backup and restore,
//! file transfer and emulator shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use emuctl_core::{CommandRunner, CommandSpec, EmuError, Result};

use crate::device::{parse_devices_output, Device};

/// Default device directory copied by the data-dir backup
pub const DEFAULT_DATA_DIR: &str = "/data/data";

/// ADB Client
#[derive(Clone)]
pub struct AdbClient {
    runner: Arc<dyn CommandRunner>,
    adb_path: PathBuf,
}

impl AdbClient {
    /// Create a new ADB client, preferring the SDK's platform-tools copy
    pub fn new(runner: Arc<dyn CommandRunner>, sdk_root: &Path) -> Self {
        let exe_name = if cfg!(windows) { "adb.exe" } else { "adb" };
        let bundled = sdk_root.join("platform-tools").join(exe_name);
        let adb_path = if bundled.exists() {
            bundled
        } else {
            PathBuf::from(exe_name)
        };

        Self { runner, adb_path }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.adb_path.to_string_lossy())
    }

    fn device_command(&self, serial: &str) -> CommandSpec {
        self.command().arg("-s").arg(serial)
    }

    /// Run an ADB command
    async fn run(&self, spec: CommandSpec) -> Result<String> {
        let output = self.runner.run_checked(&spec).await?;
        Ok(output.stdout)
    }

    /// List connected devices
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let output = self.run(self.command().args(["devices", "-l"])).await?;
        Ok(parse_devices_output(&output))
    }

    /// Emulators known to adb, in `adb devices` order
    pub async fn emulators(&self) -> Result<Vec<Device>> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .filter(Device::is_emulator)
            .collect())
    }

    /// Serials of running emulators, in `adb devices` order
    pub async fn emulator_serials(&self) -> Result<Vec<String>> {
        Ok(self.emulators().await?.into_iter().map(|d| d.serial).collect())
    }

    /// First running emulator, if any
    pub async fn first_emulator(&self) -> Result<Option<String>> {
        Ok(self.emulator_serials().await?.into_iter().next())
    }

    /// Run a shell command on device
    pub async fn shell(&self, serial: &str, command: &str) -> Result<String> {
        self.run(self.device_command(serial).arg("shell").arg(command)).await
    }

    /// Get device property
    pub async fn get_prop(&self, serial: &str, prop: &str) -> Result<String> {
        let output = self.shell(serial, &format!("getprop {}", prop)).await?;
        Ok(output.trim().to_string())
    }

    /// Full `adb backup` of every app into `path`
    pub async fn backup_all(&self, serial: &str, path: &Path) -> Result<()> {
        let spec = self
            .device_command(serial)
            .args(["backup", "-all", "-f"])
            .path_arg(path);
        self.run(spec).await?;

        info!("Backup from device {} is done!", serial);
        Ok(())
    }

    /// `adb restore` from `path`; the backup file is removed afterwards
    pub async fn restore(&self, serial: &str, path: &Path) -> Result<()> {
        let spec = self.device_command(serial).arg("restore").path_arg(path);
        self.run(spec).await?;

        info!("Restore to device {} is done!", serial);
        remove_backup(path).await
    }

    /// Pull a file or directory from device
    pub async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<()> {
        let spec = self.device_command(serial).arg("pull").arg(remote).path_arg(local);
        self.run(spec).await?;

        info!("Data pulled from device {} to {:?}", serial, local);
        Ok(())
    }

    /// Push a file or directory to device
    pub async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        let spec = self.device_command(serial).arg("push").path_arg(local).arg(remote);
        self.run(spec).await?;

        info!("Data pushed to device {} from {:?}", serial, local);
        Ok(())
    }

    /// Stop an emulator through its console
    pub async fn kill_emulator(&self, serial: &str) -> Result<()> {
        self.run(self.device_command(serial).args(["emu", "kill"])).await?;

        info!("Device {} is stopped!", serial);
        Ok(())
    }

    /// Wait until `sys.boot_completed` reports 1
    pub async fn wait_for_boot(&self, serial: &str, timeout: Duration, poll: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.get_prop(serial, "sys.boot_completed").await {
                Ok(value) if value == "1" => {
                    info!("Device {} has booted", serial);
                    return Ok(());
                }
                Ok(value) => debug!("{} boot_completed={:?}", serial, value),
                Err(e) => debug!("{} not reachable yet: {}", serial, e),
            }

            if tokio::time::Instant::now() + poll > deadline {
                return Err(EmuError::Timeout(format!("{} did not boot within {:?}", serial, timeout)));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

/// Delete a backup file; a file that is already gone is fine
pub async fn remove_backup(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed backup {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Backup {:?} was already removed", path);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuctl_core::process::testing::ScriptedRunner;
    use emuctl_core::CommandOutput;

    const DEVICES: &str = "List of devices attached\n\
        R58M123 device usb:1 model:SM_G973F transport_id:3\n\
        emulator-5556 device product:sdk model:sdk transport_id:4\n\
        emulator-5554 device product:sdk model:sdk transport_id:5\n";

    fn client(runner: Arc<ScriptedRunner>) -> AdbClient {
        AdbClient::new(runner, Path::new("/nonexistent/sdk"))
    }

    #[tokio::test]
    async fn test_emulator_serials_skip_physical() {
        let runner = Arc::new(ScriptedRunner::new().on("devices", CommandOutput::success(DEVICES)));
        let adb = client(runner);

        assert_eq!(adb.emulator_serials().await.unwrap(), vec!["emulator-5556", "emulator-5554"]);
        assert_eq!(adb.first_emulator().await.unwrap().as_deref(), Some("emulator-5556"));
    }

    #[tokio::test]
    async fn test_backup_and_kill_commands() {
        let runner = Arc::new(ScriptedRunner::new());
        let adb = client(runner.clone());

        adb.backup_all("emulator-5554", Path::new("/work/backup_emulator_14.0.ab"))
            .await
            .unwrap();
        adb.kill_emulator("emulator-5554").await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "adb -s emulator-5554 backup -all -f /work/backup_emulator_14.0.ab",
                "adb -s emulator-5554 emu kill",
            ]
        );
    }

    #[tokio::test]
    async fn test_restore_removes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.ab");
        std::fs::write(&backup, b"ANDROID BACKUP").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        let adb = client(runner.clone());
        adb.restore("emulator-5554", &backup).await.unwrap();

        assert!(!backup.exists());
        assert!(runner.calls()[0].starts_with("adb -s emulator-5554 restore "));
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.ab");
        std::fs::write(&backup, b"ANDROID BACKUP").unwrap();

        let runner = Arc::new(
            ScriptedRunner::new().on("restore", CommandOutput::failure(1, "device offline")),
        );
        let adb = client(runner);

        assert!(adb.restore("emulator-5554", &backup).await.is_err());
        assert!(backup.exists());
    }

    #[tokio::test]
    async fn test_wait_for_boot_polls() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("sys.boot_completed", CommandOutput::failure(1, "device offline"))
                .on("sys.boot_completed", CommandOutput::success("\n"))
                .on("sys.boot_completed", CommandOutput::success("1\n")),
        );
        let adb = client(runner.clone());

        adb.wait_for_boot("emulator-5554", Duration::from_secs(5), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_boot_times_out() {
        let runner = Arc::new(ScriptedRunner::new().on("sys.boot_completed", CommandOutput::success("0")));
        let adb = client(runner);

        let err = adb
            .wait_for_boot("emulator-5554", Duration::from_millis(20), Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EmuError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_backup_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_backup(&dir.path().join("gone.ab")).await.unwrap();
    }
}
