//! Container scan: classify archive entries by name.

use log::debug;

use crate::zip::ZipEntry;

/// Exact name of the binary manifest at the root of an APK.
pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// Name fragment of the iPhone home-screen icon inside an app bundle.
pub const IOS_ICON_FRAGMENT: &str = "AppIcon60x60";

const IOS_PAYLOAD_DIR: &str = "Payload";
const IOS_INFO_PLIST: &str = "Info.plist";

/// References to the entries the pipeline needs, borrowed from the archive's
/// entry list.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageEntries<'a> {
    pub manifest: Option<&'a ZipEntry>,
    pub info_plist: Option<&'a ZipEntry>,
    pub ios_icon: Option<&'a ZipEntry>,
}

/// Visit entries once, in archive order, keeping the first match per
/// category. Nothing is read or decompressed.
pub fn scan(entries: &[ZipEntry]) -> PackageEntries<'_> {
    let mut found = PackageEntries::default();

    for entry in entries {
        if entry.name == ANDROID_MANIFEST {
            found.manifest.get_or_insert(entry);
        } else if is_info_plist(&entry.name) {
            found.info_plist.get_or_insert(entry);
        } else if !entry.is_directory() && entry.name.contains(IOS_ICON_FRAGMENT) {
            found.ios_icon.get_or_insert(entry);
        }
    }

    debug!(
        "scanned {} entries: manifest={:?} plist={:?} icon={:?}",
        entries.len(),
        found.manifest.map(|e| e.name.as_str()),
        found.info_plist.map(|e| e.name.as_str()),
        found.ios_icon.map(|e| e.name.as_str()),
    );
    found
}

/// `Payload/<bundle>/Info.plist`, exactly three segments.
fn is_info_plist(name: &str) -> bool {
    let mut parts = name.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(IOS_PAYLOAD_DIR), Some(bundle), Some(IOS_INFO_PLIST), None) if !bundle.is_empty()
    )
}
