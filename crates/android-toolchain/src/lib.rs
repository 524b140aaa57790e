//! Android Toolchain Management
//!
//! Handles the parts of the Android SDK emuctl drives directly:
//! - the Android version / API level table
//! - platform and system image installation through sdkmanager
//! - SDK directory ownership

pub mod permissions;
pub mod sdk_manager;
pub mod versions;

pub use permissions::grant_sdk_permissions;
pub use sdk_manager::{InstallOutcome, InstalledComponent, SdkComponent, SdkManager};
pub use versions::{AndroidVersion, API_LEVELS};
