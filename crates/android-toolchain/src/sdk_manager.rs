//! SDK Manager
//!
//! Wraps the Android SDK manager to list and install platforms and system
//! images.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use regex::Regex;
use tracing::{info, debug};

use emuctl_core::{CommandRunner, CommandSpec, EmuError, Result};

use crate::permissions::{current_user, grant_sdk_permissions};
use crate::versions::{sort_versions, AndroidVersion};

/// SDK component types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkComponent {
    Platform(u32),                    // platforms;android-XX
    SystemImage(u32, String, String), // system-images;android-XX;tag;abi
}

impl SdkComponent {
    /// Get the SDK manager package name
    pub fn package_name(&self) -> String {
        match self {
            SdkComponent::Platform(api) => format!("platforms;android-{}", api),
            SdkComponent::SystemImage(api, abi, tag) => {
                format!("system-images;android-{};{};{}", api, tag, abi)
            }
        }
    }
}

/// Installed component info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledComponent {
    pub package: String,
    pub version: String,
    pub description: String,
    pub location: PathBuf,
}

/// What `install_android_version` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

/// Android SDK Manager wrapper
pub struct SdkManager {
    runner: Arc<dyn CommandRunner>,
    sdk_root: PathBuf,
    sdkmanager_path: PathBuf,
    use_sudo: bool,
}

impl SdkManager {
    /// Create a new SDK manager
    pub fn new(runner: Arc<dyn CommandRunner>, sdk_root: PathBuf) -> Self {
        let sdkmanager_path = Self::find_sdkmanager(&sdk_root);
        Self {
            runner,
            sdk_root,
            sdkmanager_path,
            use_sudo: false,
        }
    }

    /// Run install and permission commands through sudo
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Find the sdkmanager executable, falling back to `$PATH`
    fn find_sdkmanager(sdk_root: &Path) -> PathBuf {
        let exe_name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };

        let latest = sdk_root.join("cmdline-tools").join("latest").join("bin").join(exe_name);
        if latest.exists() {
            return latest;
        }

        // Versioned cmdline-tools/X.Y
        if let Ok(entries) = std::fs::read_dir(sdk_root.join("cmdline-tools")) {
            for entry in entries.flatten() {
                let path = entry.path().join("bin").join(exe_name);
                if path.exists() {
                    return path;
                }
            }
        }

        let legacy = sdk_root.join("tools").join("bin").join(exe_name);
        if legacy.exists() {
            return legacy;
        }

        PathBuf::from(exe_name)
    }

    fn command(&self, elevated: bool) -> CommandSpec {
        let program = self.sdkmanager_path.to_string_lossy().into_owned();
        CommandSpec::elevated(program, elevated && self.use_sudo)
            .env("ANDROID_SDK_ROOT", self.sdk_root.to_string_lossy())
            .env("ANDROID_HOME", self.sdk_root.to_string_lossy())
    }

    /// List installed packages
    pub async fn list_installed(&self) -> Result<Vec<InstalledComponent>> {
        debug!("Listing installed SDK packages...");

        let spec = self.command(false).arg("--list_installed");
        let output = self.runner.run_checked(&spec).await?;

        Ok(Self::parse_installed_output(&output.stdout, &self.sdk_root))
    }

    /// Parse the --list_installed output
    fn parse_installed_output(output: &str, sdk_root: &Path) -> Vec<InstalledComponent> {
        let mut components = Vec::new();
        let mut in_packages = false;

        for line in output.lines() {
            let line = line.trim();

            if line.starts_with("Installed packages:") {
                in_packages = true;
                continue;
            }

            if in_packages && !line.is_empty() && !line.starts_with("---") && !line.starts_with("Path") {
                let parts: Vec<&str> = line.split('|').map(|s| s.trim()).collect();
                if parts.len() >= 3 {
                    components.push(InstalledComponent {
                        package: parts[0].to_string(),
                        version: parts[1].to_string(),
                        description: parts[2].to_string(),
                        location: sdk_root.join(parts[0].replace(';', std::path::MAIN_SEPARATOR_STR)),
                    });
                }
            }
        }

        components
    }

    /// Android versions that have a platform installed
    pub async fn installed_android_versions(&self) -> Result<Vec<AndroidVersion>> {
        let spec = self.command(false).arg("--list_installed");
        let output = self.runner.run_checked(&spec).await?;
        Ok(parse_installed_versions(&output.stdout))
    }

    /// Install SDK components, accepting license prompts
    pub async fn install(&self, components: &[SdkComponent]) -> Result<()> {
        let packages: Vec<String> = components.iter().map(|c| c.package_name()).collect();

        info!("Installing SDK packages: {:?}", packages);

        let spec = self
            .command(true)
            .arg("--install")
            .args(packages)
            .input("y\n".repeat(10));
        self.runner.run_checked(&spec).await?;

        info!("SDK packages installed successfully");
        Ok(())
    }

    /// Download the platform and system image for an Android version
    pub async fn install_android_version(
        &self,
        version: &AndroidVersion,
        img_type: &str,
        sys_img: &str,
    ) -> Result<InstallOutcome> {
        let api = version.require_api_level()?;

        let installed = self.installed_android_versions().await?;
        if installed.contains(version) {
            info!("Android {} is already installed!", version);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        info!("Downloading Android {}...", version);

        if self.use_sudo {
            let user = current_user()
                .ok_or_else(|| EmuError::Settings("USER is not set".into()))?;
            grant_sdk_permissions(self.runner.as_ref(), &self.sdk_root, &user, true).await?;
        }

        self.install(&[
            SdkComponent::Platform(api),
            SdkComponent::SystemImage(api, sys_img.to_string(), img_type.to_string()),
        ])
        .await?;

        info!("Android {} is installed!", version);
        Ok(InstallOutcome::Installed)
    }
}

/// Extract supported Android versions from `sdkmanager --list_installed`
pub fn parse_installed_versions(output: &str) -> Vec<AndroidVersion> {
    let pattern = Regex::new(r"platforms;android-(\d+)").expect("static regex");

    let mut versions: Vec<AndroidVersion> = pattern
        .captures_iter(output)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .filter_map(AndroidVersion::from_api_level)
        .collect();

    sort_versions(&mut versions);
    versions.dedup();
    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuctl_core::process::testing::ScriptedRunner;
    use emuctl_core::CommandOutput;

    const LIST_INSTALLED: &str = "\
Installed packages:
  Path                                                  | Version | Description                                | Location
  -------                                               | ------- | -------                                    | -------
  emulator                                              | 34.1.19 | Android Emulator                           | emulator
  platform-tools                                        | 35.0.0  | Android SDK Platform-Tools                 | platform-tools
  platforms;android-33                                  | 3       | Android SDK Platform 33                    | platforms/android-33
  platforms;android-34                                  | 3       | Android SDK Platform 34                    | platforms/android-34
  system-images;android-34;google_apis_playstore;x86_64 | 14      | Google Play Intel x86_64 Atom System Image | system-images/android-34/google_apis_playstore/x86_64
  platforms;android-21                                  | 2       | Android SDK Platform 21                    | platforms/android-21
";

    fn manager(runner: Arc<ScriptedRunner>) -> SdkManager {
        SdkManager::new(runner, PathBuf::from("/nonexistent/sdk"))
    }

    #[test]
    fn test_component_package_name() {
        assert_eq!(
            SdkComponent::Platform(34).package_name(),
            "platforms;android-34"
        );
        assert_eq!(
            SdkComponent::SystemImage(34, "x86_64".into(), "google_apis".into()).package_name(),
            "system-images;android-34;google_apis;x86_64"
        );
    }

    #[test]
    fn test_parse_installed_versions() {
        let versions = parse_installed_versions(LIST_INSTALLED);
        let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        // android-21 is not in the supported table
        assert_eq!(versions, vec!["13.0", "14.0"]);
    }

    #[test]
    fn test_parse_installed_table() {
        let components = SdkManager::parse_installed_output(LIST_INSTALLED, Path::new("/sdk"));
        assert_eq!(components.len(), 6);
        assert_eq!(components[0].package, "emulator");
        assert_eq!(components[2].version, "3");
    }

    #[tokio::test]
    async fn test_install_skips_installed_version() {
        let runner = Arc::new(
            ScriptedRunner::new().on("--list_installed", CommandOutput::success(LIST_INSTALLED)),
        );
        let sdk = manager(runner.clone());

        let outcome = sdk
            .install_android_version(&AndroidVersion::parse("14").unwrap(), "google_apis_playstore", "x86_64")
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::AlreadyInstalled);
        assert!(runner.position("--install").is_none());
    }

    #[tokio::test]
    async fn test_install_downloads_platform_and_image() {
        let runner = Arc::new(
            ScriptedRunner::new().on("--list_installed", CommandOutput::success(LIST_INSTALLED)),
        );
        let sdk = manager(runner.clone());

        let outcome = sdk
            .install_android_version(&AndroidVersion::parse("15").unwrap(), "google_apis_playstore", "x86_64")
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::Installed);
        let calls = runner.calls();
        assert_eq!(
            calls.last().unwrap(),
            "sdkmanager --install \"platforms;android-35\" \"system-images;android-35;google_apis_playstore;x86_64\""
        );
    }

    #[tokio::test]
    async fn test_install_rejects_unsupported_version() {
        let runner = Arc::new(ScriptedRunner::new());
        let sdk = manager(runner.clone());

        let err = sdk
            .install_android_version(&AndroidVersion::parse("7").unwrap(), "google_apis", "x86_64")
            .await
            .unwrap_err();

        assert!(matches!(err, EmuError::UnsupportedVersion(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_is_reported() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("--list_installed", CommandOutput::success(LIST_INSTALLED))
                .on("--install", CommandOutput::failure(1, "Failed to find package")),
        );
        let sdk = manager(runner);

        let err = sdk
            .install_android_version(&AndroidVersion::parse("16").unwrap(), "google_apis", "x86_64")
            .await
            .unwrap_err();

        assert!(matches!(err, EmuError::CommandFailed { code: Some(1), .. }));
    }
}
