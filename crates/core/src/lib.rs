//! emuctl Core - settings and shared plumbing
//!
//! This crate provides what every emuctl crate needs: the error type,
//! emulator settings, the device status file and the process runner
//! through which all Android tooling is invoked.

pub mod config;
pub mod error;
pub mod process;
pub mod status;

pub use config::{Settings, StoredSettings};
pub use error::{EmuError, Result};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use status::DeviceStatus;

/// emuctl version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "emuctl";
