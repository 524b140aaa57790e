//! AVD (Android Virtual Device) Manager
//!
//! Creates the AVD that backs the managed emulator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use directories::BaseDirs;
use tracing::{info, debug};

use emuctl_core::{CommandRunner, CommandSpec, EmuError, Result, Settings};

/// `config.ini` key holding the data partition size
pub const DATA_PARTITION_KEY: &str = "disk.dataPartition.size";

/// AVD configuration for creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvdConfig {
    pub name: String,
    pub package: String, // system image package
    pub device: String,  // device profile
    pub data_partition: Option<String>,
    pub force: bool,
}

impl AvdConfig {
    /// Build the AVD description for an API level from settings
    pub fn from_settings(settings: &Settings, api_level: u32) -> Self {
        Self {
            name: settings.name.clone(),
            package: format!(
                "system-images;android-{};{};{}",
                api_level, settings.img_type, settings.sys_img
            ),
            device: settings.device.clone(),
            data_partition: settings.data_partition.clone(),
            force: true,
        }
    }
}

/// AVD Manager
pub struct AvdManager {
    runner: Arc<dyn CommandRunner>,
    avdmanager_path: PathBuf,
    avd_home: PathBuf,
}

impl AvdManager {
    /// Create a new AVD manager
    pub fn new(runner: Arc<dyn CommandRunner>, sdk_path: &Path) -> Self {
        Self {
            runner,
            avdmanager_path: Self::find_avdmanager(sdk_path),
            avd_home: default_avd_home(|key| std::env::var_os(key).map(PathBuf::from)),
        }
    }

    /// Override the directory holding `<name>.avd`
    pub fn with_avd_home(mut self, avd_home: PathBuf) -> Self {
        self.avd_home = avd_home;
        self
    }

    fn find_avdmanager(sdk_path: &Path) -> PathBuf {
        let exe_name = if cfg!(windows) { "avdmanager.bat" } else { "avdmanager" };
        let path = sdk_path.join("cmdline-tools").join("latest").join("bin").join(exe_name);
        if path.exists() {
            path
        } else {
            PathBuf::from(exe_name)
        }
    }

    /// Directory of an AVD
    pub fn avd_dir(&self, name: &str) -> PathBuf {
        self.avd_home.join(format!("{}.avd", name))
    }

    /// Create (or with `force`, recreate) an AVD
    pub async fn create_avd(&self, config: &AvdConfig) -> Result<()> {
        info!("Creating AVD: {}", config.name);

        let mut spec = CommandSpec::new(self.avdmanager_path.to_string_lossy())
            .args(["create", "avd"])
            .arg("-n")
            .arg(&config.name)
            .arg("-k")
            .arg(&config.package)
            .arg("-d")
            .arg(&config.device);

        if config.force {
            spec = spec.arg("--force");
        }

        // Answer "no" to the custom hardware profile question
        spec = spec.input("no\n");
        self.runner.run_checked(&spec).await?;

        if let Some(ref size) = config.data_partition {
            let config_path = self.avd_dir(&config.name).join("config.ini");
            if !config_path.exists() {
                return Err(EmuError::NotFound(config_path));
            }
            set_config_value(&config_path, DATA_PARTITION_KEY, size).await?;
        }

        info!("AVD created successfully: {}", config.name);
        Ok(())
    }
}

/// Where avdmanager puts AVDs, following the SDK's own lookup order
fn default_avd_home<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(home) = lookup("ANDROID_AVD_HOME") {
        return home;
    }

    lookup("ANDROID_USER_HOME")
        .or_else(|| lookup("ANDROID_EMULATOR_HOME"))
        .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(".android")))
        .unwrap_or_else(|| PathBuf::from(".android"))
        .join("avd")
}

/// Set `key=value` in an AVD `config.ini`, replacing an existing entry
pub async fn set_config_value(config_path: &Path, key: &str, value: &str) -> Result<()> {
    let content = tokio::fs::read_to_string(config_path).await?;
    let entry = format!("{}={}", key, value);

    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let existing = line.split('=').next().map(str::trim);
            if existing == Some(key) {
                replaced = true;
                entry.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(entry);
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    tokio::fs::write(config_path, updated).await?;

    debug!("Set {}={} in {:?}", key, value, config_path);
    Ok(())
}
