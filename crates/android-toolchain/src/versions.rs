//! Android versions
//!
//! Maps user-facing Android versions ("14.0") to API levels (34).

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use emuctl_core::EmuError;

/// Supported Android versions and their API levels
pub const API_LEVELS: &[(&str, u32)] = &[
    ("9.0", 28),
    ("10.0", 29),
    ("11.0", 30),
    ("12.0", 32),
    ("13.0", 33),
    ("14.0", 34),
    ("15.0", 35),
    ("16.0", 36),
];

/// A normalised Android version string such as "14.0"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AndroidVersion(String);

impl AndroidVersion {
    /// Normalise user input: "14" becomes "14.0", "14.0" stays as is
    pub fn parse(input: &str) -> Result<Self, EmuError> {
        let input = input.trim();
        let valid = !input.is_empty()
            && input.split('.').count() <= 2
            && input.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));

        if !valid {
            return Err(EmuError::UnsupportedVersion(input.to_string()));
        }

        if input.contains('.') {
            Ok(Self(input.to_string()))
        } else {
            Ok(Self(format!("{}.0", input)))
        }
    }

    /// Look a version up by API level
    pub fn from_api_level(api: u32) -> Option<Self> {
        API_LEVELS
            .iter()
            .find(|(_, level)| *level == api)
            .map(|(version, _)| Self(version.to_string()))
    }

    /// API level, `None` if the version is not supported
    pub fn api_level(&self) -> Option<u32> {
        API_LEVELS
            .iter()
            .find(|(version, _)| *version == self.0)
            .map(|(_, level)| *level)
    }

    pub fn is_supported(&self) -> bool {
        self.api_level().is_some()
    }

    /// API level or an `UnsupportedVersion` error
    pub fn require_api_level(&self) -> Result<u32, EmuError> {
        self.api_level()
            .ok_or_else(|| EmuError::UnsupportedVersion(self.0.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn major(&self) -> u32 {
        self.0
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for AndroidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AndroidVersion {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Sort versions numerically ("9.0" before "10.0")
pub fn sort_versions(versions: &mut [AndroidVersion]) {
    versions.sort_by(|a, b| a.major().cmp(&b.major()).then_with(|| a.0.cmp(&b.0)));
}
