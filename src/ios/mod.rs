//! iOS package (`.ipa`) identity extraction.
//!
//! Identity comes from `Payload/<App>.app/Info.plist`; the icon is the
//! bundle's `AppIcon60x60` image, usually stored in Apple's optimized PNG
//! form (see [`cgbi`]).

pub mod cgbi;

use image::{DynamicImage, ImageFormat};
use log::{debug, warn};
use serde::Deserialize;

use crate::error::{Outcome, ParseError, Result};
use crate::package::PackageArchive;
use crate::zip::ZipEntry;
use cgbi::{RevertError, RevertErrorKind, revert_optimization};

/// The `Info.plist` keys needed for package identity. Missing keys are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InfoPlist {
    #[serde(rename = "CFBundleName", default)]
    pub bundle_name: String,
    #[serde(rename = "CFBundleDisplayName", default)]
    pub bundle_display_name: String,
    #[serde(rename = "CFBundleVersion", default)]
    pub bundle_version: String,
    #[serde(rename = "CFBundleShortVersionString", default)]
    pub bundle_short_version: String,
    #[serde(rename = "CFBundleIdentifier", default)]
    pub bundle_identifier: String,
}

impl InfoPlist {
    /// Decode a binary or XML property list.
    pub fn from_bytes(data: &[u8]) -> std::result::Result<Self, plist::Error> {
        plist::from_bytes(data)
    }

    /// The display name when set, the bundle name otherwise.
    pub fn display_name(&self) -> &str {
        if self.bundle_display_name.is_empty() {
            &self.bundle_name
        } else {
            &self.bundle_display_name
        }
    }
}

/// Read and decode the `Info.plist` entry found by the container scan.
pub async fn read_info_plist(archive: &PackageArchive, entry: Option<&ZipEntry>) -> Result<InfoPlist> {
    let entry = entry.ok_or(ParseError::PlistNotFound)?;
    let bytes = archive
        .read_entry(entry)
        .await
        .map_err(|e| ParseError::container("reading Info.plist", e))?;
    let plist = InfoPlist::from_bytes(&bytes).map_err(ParseError::PlistDecodeFailed)?;
    debug!(
        "Info.plist: identifier={} version={} build={}",
        plist.bundle_identifier, plist.bundle_short_version, plist.bundle_version
    );
    Ok(plist)
}

/// Read the icon entry found by the container scan and decode it.
pub async fn read_icon(archive: &PackageArchive, entry: Option<&ZipEntry>) -> Result<DynamicImage> {
    let entry = entry.ok_or(ParseError::IconNotFound)?;
    let bytes = archive
        .read_entry(entry)
        .await
        .map_err(|e| ParseError::container("reading icon", e))?;
    debug!("icon entry {} ({} bytes)", entry.name, bytes.len());
    decode_icon(&bytes)
}

/// Revert the PNG optimization and decode the result.
///
/// When only the image data could not be restored the reverted stream is
/// still decoded as is.
pub fn decode_icon(data: &[u8]) -> Result<DynamicImage> {
    let mut png = Vec::with_capacity(data.len());
    let result = revert_optimization(data, &mut png);
    let png = classify_revert(result, png)
        .into_result()
        .map_err(ParseError::IconTransformFailed)?;

    image::load_from_memory_with_format(&png, ImageFormat::Png).map_err(ParseError::IconDecodeFailed)
}

fn classify_revert(
    result: std::result::Result<(), RevertError>,
    output: Vec<u8>,
) -> Outcome<Vec<u8>, RevertError> {
    match result {
        Ok(()) => Outcome::Complete(output),
        Err(err) if err.kind() == RevertErrorKind::Data => {
            warn!("icon image data left as is: {}", err);
            Outcome::Recoverable(output)
        }
        Err(err) => Outcome::Fatal(err),
    }
}
