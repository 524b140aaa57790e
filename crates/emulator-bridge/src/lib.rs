//! Android Emulator Bridge
//!
//! Drives adb, avdmanager and the emulator binary for emuctl.

pub mod adb;
pub mod avd;
pub mod device;
pub mod emulator;

pub use adb::{AdbClient, DEFAULT_DATA_DIR};
pub use avd::{AvdConfig, AvdManager};
pub use device::{Device, DeviceState, DeviceType};
pub use emulator::{EmulatorInstance, EmulatorLauncher, EmulatorOptions};
