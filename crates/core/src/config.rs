//! Emulator Settings
//!
//! Settings come from two places:
//! - a TOML file holding the values that survive an upgrade (Android
//!   version, image type, system image, device profile)
//! - environment variables, which fill in whatever the file lacks on every
//!   load and always provide everything else
//!
//! Built-in defaults are never written back, and only an explicit change
//! (switching the Android version) touches the file.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{EmuError, Result};

/// Environment variable names
pub mod env {
    pub const ANDROID_VERSION: &str = "EMULATOR_ANDROID_VERSION";
    pub const IMG_TYPE: &str = "EMULATOR_IMG_TYPE";
    pub const SYS_IMG: &str = "EMULATOR_SYS_IMG";
    pub const DEVICE: &str = "EMULATOR_DEVICE";
    pub const NAME: &str = "EMULATOR_NAME";
    pub const DATA_PARTITION: &str = "EMULATOR_DATA_PARTITION";
    pub const ADDITIONAL_ARGS: &str = "EMULATOR_ADDITIONAL_ARGS";
    pub const NO_SKIN: &str = "EMULATOR_NO_SKIN";
    pub const CONFIG_PATH: &str = "EMULATOR_CONFIG_PATH";
    pub const WORK_PATH: &str = "WORK_PATH";
    pub const LOG_PATH: &str = "LOG_PATH";
    pub const WEB_LOG: &str = "WEB_LOG";
    pub const WEB_LOG_PORT: &str = "WEB_LOG_PORT";
    pub const ANDROID_HOME: &str = "ANDROID_HOME";
    pub const ANDROID_SDK_ROOT: &str = "ANDROID_SDK_ROOT";
    pub const USE_SUDO: &str = "EMULATOR_USE_SUDO";
}

pub const DEFAULT_IMG_TYPE: &str = "google_apis_playstore";
pub const DEFAULT_SYS_IMG: &str = "x86_64";
pub const DEFAULT_DEVICE: &str = "pixel_6";
pub const DEFAULT_NAME: &str = "emuctl";
pub const DEFAULT_WEB_LOG_PORT: u16 = 9000;
pub const DEFAULT_SDK_ROOT: &str = "/opt/android";

/// The part of the settings written to disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Resolved emulator settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Current Android version, e.g. "14.0"
    pub android_version: Option<String>,
    /// System image tag, e.g. "google_apis_playstore"
    pub img_type: String,
    /// System image ABI, e.g. "x86_64"
    pub sys_img: String,
    /// Hardware profile passed to avdmanager
    pub device: String,
    /// AVD name
    pub name: String,
    /// Data partition size handed to the emulator
    pub data_partition: Option<String>,
    /// Extra emulator arguments
    pub additional_args: Vec<String>,
    /// Start the emulator without a skin
    pub no_skin: bool,
    /// Directory for backups and the device status file
    pub work_path: PathBuf,
    /// Directory holding log files
    pub log_path: Option<PathBuf>,
    /// Share logs over HTTP
    pub web_log: bool,
    /// Port of the log server
    pub web_log_port: u16,
    /// Android SDK root
    pub sdk_root: PathBuf,
    /// Run sdkmanager and permission fix-ups through sudo
    pub use_sudo: bool,
    /// Where the persisted part lives
    pub file: Option<PathBuf>,
    /// Values that came from the file or the environment
    persisted: StoredSettings,
}

/// Parse a boolean environment value
pub fn parse_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Get the default settings file path
    pub fn default_file() -> Option<PathBuf> {
        ProjectDirs::from("com", "emuctl", "emuctl")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolve settings from stored values and an environment lookup
    pub fn resolve<F>(stored: StoredSettings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        let persisted = StoredSettings {
            android_version: stored.android_version.or_else(|| var(env::ANDROID_VERSION)),
            img_type: stored.img_type.or_else(|| var(env::IMG_TYPE)),
            sys_img: stored.sys_img.or_else(|| var(env::SYS_IMG)),
            device: stored.device.or_else(|| var(env::DEVICE)),
        };

        Self {
            android_version: persisted.android_version.clone(),
            img_type: persisted
                .img_type
                .clone()
                .unwrap_or_else(|| DEFAULT_IMG_TYPE.to_string()),
            sys_img: persisted
                .sys_img
                .clone()
                .unwrap_or_else(|| DEFAULT_SYS_IMG.to_string()),
            device: persisted
                .device
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            name: var(env::NAME).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            data_partition: var(env::DATA_PARTITION),
            additional_args: var(env::ADDITIONAL_ARGS)
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            no_skin: parse_bool(var(env::NO_SKIN).as_deref()),
            work_path: var(env::WORK_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            log_path: var(env::LOG_PATH).map(PathBuf::from),
            web_log: parse_bool(var(env::WEB_LOG).as_deref()),
            web_log_port: var(env::WEB_LOG_PORT)
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_WEB_LOG_PORT),
            sdk_root: var(env::ANDROID_HOME)
                .or_else(|| var(env::ANDROID_SDK_ROOT))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SDK_ROOT)),
            use_sudo: var(env::USE_SUDO).map(|v| parse_bool(Some(&v))).unwrap_or(true),
            file: None,
            persisted,
        }
    }

    /// Load settings from the process environment and the settings file
    pub async fn load() -> Result<Self> {
        let file = std::env::var(env::CONFIG_PATH)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(Self::default_file)
            .ok_or_else(|| EmuError::Settings("Cannot determine settings path".into()))?;

        Self::load_from(&file, |key| std::env::var(key).ok()).await
    }

    /// Load settings from a given file and environment lookup
    pub async fn load_from<F>(file: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stored = if file.exists() {
            debug!("Loading settings from {:?}", file);
            let contents = tokio::fs::read_to_string(file).await?;
            toml::from_str(&contents)?
        } else {
            info!("Settings file not found, using the environment");
            StoredSettings::default()
        };

        let mut settings = Self::resolve(stored, lookup);
        settings.file = Some(file.to_path_buf());
        Ok(settings)
    }

    /// What [`save`](Self::save) writes: file and environment values, never defaults
    pub fn stored(&self) -> StoredSettings {
        StoredSettings {
            android_version: self.android_version.clone(),
            ..self.persisted.clone()
        }
    }

    /// Save the persisted part to the settings file
    pub async fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(&self.stored())?;
        tokio::fs::write(file, contents).await?;

        debug!("Settings saved to {:?}", file);
        Ok(())
    }

    /// Switch the current Android version and persist it
    pub async fn set_android_version(&mut self, version: &str) -> Result<()> {
        self.android_version = Some(version.to_string());
        self.save().await
    }

    /// Directory used for backups, created if needed
    pub async fn ensure_work_path(&self) -> Result<&Path> {
        tokio::fs::create_dir_all(&self.work_path).await?;
        Ok(&self.work_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(StoredSettings::default(), lookup(&[]));
        assert_eq!(settings.android_version, None);
        assert_eq!(settings.img_type, DEFAULT_IMG_TYPE);
        assert_eq!(settings.sys_img, DEFAULT_SYS_IMG);
        assert_eq!(settings.device, DEFAULT_DEVICE);
        assert_eq!(settings.web_log_port, DEFAULT_WEB_LOG_PORT);
        assert_eq!(settings.sdk_root, PathBuf::from(DEFAULT_SDK_ROOT));
        assert!(!settings.web_log);
        assert!(settings.use_sudo);
    }

    #[test]
    fn test_stored_values_win_over_environment() {
        let stored = StoredSettings {
            android_version: Some("14.0".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(
            stored,
            lookup(&[
                (env::ANDROID_VERSION, "13.0"),
                (env::DEVICE, "nexus_5"),
                (env::ADDITIONAL_ARGS, "-gpu  host -no-audio"),
                (env::NO_SKIN, "TRUE"),
                (env::DATA_PARTITION, ""),
            ]),
        );

        assert_eq!(settings.android_version.as_deref(), Some("14.0"));
        assert_eq!(settings.device, "nexus_5");
        assert_eq!(settings.additional_args, vec!["-gpu", "host", "-no-audio"]);
        assert!(settings.no_skin);
        assert_eq!(settings.data_partition, None);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(Some("true")));
        assert!(parse_bool(Some(" Yes ")));
        assert!(parse_bool(Some("1")));
        assert!(!parse_bool(Some("false")));
        assert!(!parse_bool(Some("nope")));
        assert!(!parse_bool(None));
    }

    #[tokio::test]
    async fn test_set_android_version_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::load_from(&file, lookup(&[(env::ANDROID_VERSION, "13.0")]))
            .await
            .unwrap();
        assert_eq!(settings.android_version.as_deref(), Some("13.0"));
        assert!(!file.exists());

        settings.set_android_version("14.0").await.unwrap();
        assert!(file.exists());

        // The environment still says 13.0, but the file now wins
        let reloaded = Settings::load_from(&file, lookup(&[(env::ANDROID_VERSION, "13.0")]))
            .await
            .unwrap();
        assert_eq!(reloaded.android_version.as_deref(), Some("14.0"));
    }

    #[tokio::test]
    async fn test_environment_fills_unsaved_values_on_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");

        let mut first = Settings::load_from(&file, lookup(&[])).await.unwrap();
        assert_eq!(first.img_type, DEFAULT_IMG_TYPE);
        first.set_android_version("13.0").await.unwrap();

        let persisted = std::fs::read_to_string(&file).unwrap();
        assert!(persisted.contains("android_version = \"13.0\""));
        assert!(!persisted.contains("img_type"));

        let second = Settings::load_from(&file, lookup(&[(env::IMG_TYPE, "google_apis")]))
            .await
            .unwrap();
        assert_eq!(second.img_type, "google_apis");
        assert_eq!(second.android_version.as_deref(), Some("13.0"));
    }

    #[tokio::test]
    async fn test_load_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");

        Settings::load_from(&file, lookup(&[(env::IMG_TYPE, "google_apis")]))
            .await
            .unwrap();
        assert!(!file.exists());
    }
}
