//! SDK directory permissions
//!
//! sdkmanager run through sudo leaves root-owned files behind; hand the
//! SDK tree back to the current user before installing.

use std::path::Path;
use tracing::info;

use emuctl_core::{CommandRunner, CommandSpec, Result};

/// Mode applied recursively to the SDK root
pub const SDK_MODE: &str = "774";

/// The user that should own the SDK, from `$USER`
pub fn current_user() -> Option<String> {
    std::env::var("USER").ok().filter(|u| !u.is_empty())
}

/// `chown -R <user> <sdk_root>` followed by `chmod -R 774 <sdk_root>`
pub async fn grant_sdk_permissions(
    runner: &dyn CommandRunner,
    sdk_root: &Path,
    user: &str,
    sudo: bool,
) -> Result<()> {
    let chown = CommandSpec::elevated("chown", sudo)
        .arg("-R")
        .arg(user)
        .path_arg(sdk_root);
    runner.run_checked(&chown).await?;

    let chmod = CommandSpec::elevated("chmod", sudo)
        .arg("-R")
        .arg(SDK_MODE)
        .path_arg(sdk_root);
    runner.run_checked(&chmod).await?;

    info!("Granted {} access to {:?}", user, sdk_root);
    Ok(())
}
