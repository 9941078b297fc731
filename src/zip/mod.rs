//! ZIP container reading.
//!
//! Both package formats are ZIP archives: `.apk` files carry
//! `AndroidManifest.xml` and `resources.arsc` at the root, `.ipa` files
//! carry an application bundle under `Payload/`.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, entries)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`archive`]: Entry listing and decompression used by the pipeline
//!
//! This implementation reads the EOCD first (from the end of the file),
//! then the Central Directory, so entries can be classified by name
//! without reading any file data.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) and DEFLATE methods, with CRC-32 checks
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support

mod archive;
mod parser;
mod structures;

pub use archive::ZipArchive;
pub use parser::ZipParser;
pub use structures::*;
