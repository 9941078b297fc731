//! Platform selection from the package file name.

use std::fmt;
use std::path::Path;

use crate::error::{ParseError, Result};

/// The two package platforms, resolved once per extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub const ANDROID_EXTENSION: &'static str = "apk";
    pub const IOS_EXTENSION: &'static str = "ipa";

    /// Pick the platform from the file extension (case-sensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().map(|e| e.to_string_lossy());
        match extension.as_deref() {
            Some(Self::ANDROID_EXTENSION) => Ok(Platform::Android),
            Some(Self::IOS_EXTENSION) => Ok(Platform::Ios),
            other => Err(ParseError::UnrecognizedPlatform {
                extension: other.map(str::to_string),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("android"),
            Platform::Ios => f.write_str("ios"),
        }
    }
}
