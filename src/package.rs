//! The extraction pipeline: dispatch, scan, platform decode, assembly.

use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::android::{self, ApkResources};
use crate::error::{ParseError, Result};
use crate::io::LocalFileReader;
use crate::ios;
use crate::platform::Platform;
use crate::scanner;
use crate::zip::ZipArchive;

/// A package opened from the local filesystem.
pub type PackageArchive = ZipArchive<LocalFileReader>;

/// Density requested for Android launcher icons (xxxhdpi and above).
pub const ICON_DENSITY: u16 = 720;

/// Identity metadata of one package file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub bundle_id: String,
    pub version: String,
    pub build: String,
    #[serde(skip)]
    pub icon: Option<DynamicImage>,
    /// Size of the package file in bytes
    pub size: u64,
}

/// Open a package file and read its central directory.
pub(crate) async fn open_archive(path: &Path) -> Result<PackageArchive> {
    let reader = LocalFileReader::new(path).map_err(|e| ParseError::FileOpenFailed {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    ZipArchive::new(Arc::new(reader))
        .await
        .map_err(|e| ParseError::container("reading zip directory", e))
}

/// Extract name, identifier, version, build, icon and size from an `.apk`
/// or `.ipa` file.
///
/// The platform is chosen from the file extension alone.
///
/// # Errors
///
/// Fails when the extension is neither `apk` nor `ipa`, the file is not a
/// readable ZIP archive, the manifest or property list is missing or
/// malformed, or no icon can be decoded. A missing Android label is not an
/// error; the name is left empty.
pub async fn parse_package(path: impl AsRef<Path>) -> Result<PackageInfo> {
    let path = path.as_ref();
    let platform = Platform::from_path(path)?;
    info!("parsing {} package {}", platform, path.display());

    let archive = open_archive(path).await?;
    let size = archive.size();
    let entries = scanner::scan(archive.entries());

    let info = match platform {
        Platform::Android => {
            let manifest = android::read_manifest(&archive, entries.manifest).await?;
            drop(archive);

            let resources = ApkResources::open(path).await?;
            let icon = resources.icon(ICON_DENSITY).await.into_result()?;
            let name = resources.label().into_result()?;
            PackageInfo {
                name,
                bundle_id: manifest.package,
                version: manifest.version_name,
                build: manifest.version_code,
                icon: Some(icon),
                size,
            }
        }
        Platform::Ios => {
            let plist = ios::read_info_plist(&archive, entries.info_plist).await?;
            let icon = ios::read_icon(&archive, entries.ios_icon).await?;
            PackageInfo {
                name: plist.display_name().to_string(),
                bundle_id: plist.bundle_identifier,
                version: plist.bundle_short_version,
                build: plist.bundle_version,
                icon: Some(icon),
                size,
            }
        }
    };

    debug!(
        "{}: name={:?} id={} version={} build={} size={}",
        path.display(),
        info.name,
        info.bundle_id,
        info.version,
        info.build,
        info.size
    );
    Ok(info)
}
