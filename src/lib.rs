//! emuctl - Android emulator version manager
//!
//! Installs Android system images, moves a running emulator between
//! Android versions without losing app data, backs up and restores
//! emulator state, and shares the log directory over HTTP.
//!
//! ## Architecture
//!
//! - `emuctl-core`: settings, errors, device status file, process runner
//! - `emuctl-android-toolchain`: Android versions and sdkmanager
//! - `emuctl-emulator-bridge`: adb, avdmanager and the emulator binary
//! - `emuctl-log-share`: HTTP log server

#![warn(clippy::all)]

pub mod commands;
pub mod version_manager;

// Re-export main components for library usage
pub use emuctl_core as core;
pub use emuctl_android_toolchain as toolchain;
pub use emuctl_emulator_bridge as emulator;
pub use emuctl_log_share as log_share;

pub use version_manager::{UpgradeOutcome, VersionManager};
