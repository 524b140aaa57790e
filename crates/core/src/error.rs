//! Error types for emuctl
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for emuctl
#[derive(Error, Debug)]
pub enum EmuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{command}` exited with {}: {stderr}", exit_code_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Android {0} is not supported")]
    UnsupportedVersion(String),

    #[error("Android {0} is not installed")]
    NotInstalled(String),

    #[error("No emulator is running")]
    NoDevice,

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP server error: {0}")]
    Server(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Result type alias for emuctl operations
pub type Result<T> = std::result::Result<T, EmuError>;

impl EmuError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            EmuError::Io(e) => format!("File operation failed: {}", e),
            EmuError::Settings(msg) => format!("Configuration error: {}", msg),
            EmuError::CommandFailed { command, .. } => {
                format!("Command failed: {}. See the log for details.", command)
            }
            EmuError::UnsupportedVersion(v) => format!("Android {} is not supported!", v),
            EmuError::NotInstalled(v) => {
                format!("Android {} is not installed! Install it first.", v)
            }
            EmuError::NoDevice => "No emulator is running!".to_string(),
            EmuError::NotFound(path) => format!("Not found: {}", path.display()),
            _ => self.to_string(),
        }
    }
}
