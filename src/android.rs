//! Android package (`.apk`) identity extraction.
//!
//! The manifest decoder reads `package`, `versionName` and `versionCode`
//! from the manifest found by the container scan. Icon and label live in
//! the resource table, so [`ApkResources`] opens the package again with its
//! own handle and resolves `<application android:icon/android:label>`.

use image::{DynamicImage, GenericImageView};
use log::{debug, warn};
use std::path::Path;

use crate::error::{Outcome, ParseError, Result};
use crate::package::{PackageArchive, open_archive};
use crate::res::config::rank_by_density;
use crate::res::{ResValue, ResourceTable, XmlDocument, XmlElement};
use crate::scanner::ANDROID_MANIFEST;
use crate::zip::ZipEntry;

/// Name of the compiled resource table at the root of every APK.
pub const RESOURCE_TABLE: &str = "resources.arsc";

/// How many reference hops are followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 8;

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".webp", ".jpg", ".jpeg"];

/// Identity attributes of the manifest's root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndroidManifest {
    pub package: String,
    pub version_name: String,
    pub version_code: String,
}

impl AndroidManifest {
    /// Read the identity attributes; missing ones become empty strings.
    pub fn from_document(document: &XmlDocument) -> Self {
        let root = &document.root;
        let text = |name: &str| root.attribute_text(name).unwrap_or_default().to_string();
        Self {
            package: text("package"),
            version_name: text("versionName"),
            version_code: text("versionCode"),
        }
    }
}

/// Read and decode the manifest entry found by the container scan.
pub async fn read_manifest(
    archive: &PackageArchive,
    entry: Option<&ZipEntry>,
) -> Result<AndroidManifest> {
    let entry = entry.ok_or(ParseError::ManifestNotFound)?;
    let bytes = archive
        .read_entry(entry)
        .await
        .map_err(|e| ParseError::container("reading AndroidManifest.xml", e))?;
    let document =
        XmlDocument::from_bytes(&bytes).map_err(|e| ParseError::ManifestDecodeFailed(e.into()))?;

    let manifest = AndroidManifest::from_document(&document);
    debug!(
        "manifest: package={} versionName={} versionCode={}",
        manifest.package, manifest.version_name, manifest.version_code
    );
    Ok(manifest)
}

/// Resource-table-aware view of an APK, used for icon and label lookups.
pub struct ApkResources {
    archive: PackageArchive,
    table: Option<ResourceTable>,
    application: Option<XmlElement>,
}

impl ApkResources {
    /// Open the package with a fresh handle and load its resource table and
    /// `<application>` element.
    ///
    /// A package without `resources.arsc` opens fine; no reference will
    /// resolve through it.
    pub async fn open(path: &Path) -> Result<Self> {
        let archive = open_archive(path).await?;

        let table = match archive.by_name(RESOURCE_TABLE) {
            Some(entry) => {
                let bytes = archive
                    .read_entry(entry)
                    .await
                    .map_err(|e| ParseError::container("reading resources.arsc", e))?;
                let table = ResourceTable::from_bytes(&bytes)
                    .map_err(|e| ParseError::container("decoding resources.arsc", e))?;
                Some(table)
            }
            None => {
                debug!("{} has no {}", path.display(), RESOURCE_TABLE);
                None
            }
        };

        let manifest = archive.by_name(ANDROID_MANIFEST).ok_or(ParseError::ManifestNotFound)?;
        let bytes = archive
            .read_entry(manifest)
            .await
            .map_err(|e| ParseError::container("reading AndroidManifest.xml", e))?;
        let document =
            XmlDocument::from_bytes(&bytes).map_err(|e| ParseError::ManifestDecodeFailed(e.into()))?;
        let application = document.root.child("application").cloned();

        Ok(Self {
            archive,
            table,
            application,
        })
    }

    /// Resolve and decode the launcher icon closest to `density`.
    ///
    /// Candidates are tried best match first; the first one that is an image
    /// file in the archive and decodes wins. No candidate is fatal.
    pub async fn icon(&self, density: u16) -> Outcome<DynamicImage, ParseError> {
        let Some(attr) = self.application.as_ref().and_then(|app| app.attribute("icon")) else {
            debug!("manifest declares no application icon");
            return Outcome::Fatal(ParseError::IconNotFound);
        };

        let paths = match (&self.table, attr.value.reference()) {
            (Some(table), Some(_)) => icon_paths(table, attr.value, density, 0),
            (None, Some(id)) => {
                debug!("icon @0x{:08X} cannot resolve without {}", id, RESOURCE_TABLE);
                Vec::new()
            }
            // a literal path in the manifest
            (_, None) => vec![attr.text.clone()],
        };

        for path in paths {
            if !is_image_path(&path) {
                debug!("skipping non-bitmap icon {}", path);
                continue;
            }
            let Some(entry) = self.archive.by_name(&path) else {
                debug!("icon {} is missing from the archive", path);
                continue;
            };
            let bytes = match self.archive.read_entry(entry).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("failed reading icon {}: {:#}", path, e);
                    continue;
                }
            };
            match image::load_from_memory(&bytes) {
                Ok(icon) => {
                    debug!("icon resolved to {} ({}x{})", path, icon.width(), icon.height());
                    return Outcome::Complete(icon);
                }
                Err(e) => debug!("failed decoding icon {}: {}", path, e),
            }
        }

        Outcome::Fatal(ParseError::IconNotFound)
    }

    /// Resolve the application label; any failure recovers to `""`.
    pub fn label(&self) -> Outcome<String, ParseError> {
        let Some(attr) = self.application.as_ref().and_then(|app| app.attribute("label")) else {
            return Outcome::Recoverable(String::new());
        };

        let Some(id) = attr.value.reference() else {
            return Outcome::Complete(attr.text.clone());
        };

        match self
            .table
            .as_ref()
            .and_then(|table| resolve_string(table, id, 0))
        {
            Some(label) => Outcome::Complete(label),
            None => {
                warn!("could not resolve application label @0x{:08X}", id);
                Outcome::Recoverable(String::new())
            }
        }
    }
}

/// File paths for an icon value, best density match first.
fn icon_paths(table: &ResourceTable, value: ResValue, density: u16, depth: usize) -> Vec<String> {
    if let Some(path) = table.string(&value) {
        return vec![path.to_string()];
    }
    let Some(id) = value.reference() else {
        return Vec::new();
    };
    if depth >= MAX_REFERENCE_DEPTH {
        return Vec::new();
    }

    rank_by_density(table.resolve(id), density)
        .into_iter()
        .flat_map(|(_, value)| icon_paths(table, value, density, depth + 1))
        .collect()
}

/// Resolve a string resource, preferring the configuration without locale.
fn resolve_string(table: &ResourceTable, id: u32, depth: usize) -> Option<String> {
    if depth >= MAX_REFERENCE_DEPTH {
        return None;
    }
    let candidates = table.resolve(id);
    let (_, value) = candidates
        .iter()
        .find(|(config, _)| !config.has_locale())
        .or_else(|| candidates.first())?;

    match value.reference() {
        Some(next) => resolve_string(table, next, depth + 1),
        None => table.string(value).map(str::to_string),
    }
}

fn is_image_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
