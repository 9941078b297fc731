//! Error and step-outcome types for the extraction pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::ios::cgbi::RevertError;

/// Boxed cause carried by errors that wrap a collaborator failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A Result type alias over [`ParseError`].
pub type Result<V> = std::result::Result<V, ParseError>;

/// Everything that can make a package extraction fail.
///
/// Each variant names the step that failed; variants wrapping a collaborator
/// keep the underlying cause as their source.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed opening file {}: {source}", .path.display())]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed {step}: {source}")]
    ContainerReadFailed {
        step: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("unknown platform for extension {}", describe_extension(.extension))]
    UnrecognizedPlatform { extension: Option<String> },
    #[error("AndroidManifest.xml is not found")]
    ManifestNotFound,
    #[error("failed decoding AndroidManifest.xml: {0}")]
    ManifestDecodeFailed(#[source] BoxError),
    #[error("Info.plist is not found")]
    PlistNotFound,
    #[error("failed decoding plist data: {0}")]
    PlistDecodeFailed(#[source] plist::Error),
    #[error("icon is not found")]
    IconNotFound,
    #[error("failed png revert optimization: {0}")]
    IconTransformFailed(#[source] RevertError),
    #[error("failed decoding icon: {0}")]
    IconDecodeFailed(#[source] image::ImageError),
}

fn describe_extension(extension: &Option<String>) -> String {
    match extension {
        Some(ext) => format!("'.{ext}'"),
        None => "(none)".to_string(),
    }
}

impl ParseError {
    pub(crate) fn container(step: &'static str, err: anyhow::Error) -> Self {
        ParseError::ContainerReadFailed {
            step,
            source: err.into(),
        }
    }
}

/// Result of a pipeline step whose failures are not all fatal.
///
/// `Recoverable` carries the value the pipeline continues with after a
/// tolerated failure (an empty label, a partially reverted icon stream).
#[derive(Debug)]
pub enum Outcome<T, E> {
    Complete(T),
    Recoverable(T),
    Fatal(E),
}

impl<T, E> Outcome<T, E> {
    /// Collapse into a `Result`, keeping recovered values.
    pub fn into_result(self) -> std::result::Result<T, E> {
        match self {
            Outcome::Complete(value) | Outcome::Recoverable(value) => Ok(value),
            Outcome::Fatal(err) => Err(err),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Outcome::Recoverable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }
}
