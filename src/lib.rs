//! # pkginfo
//!
//! Read the identity of a mobile application package without platform
//! tools: display name, bundle or package identifier, version, build, the
//! launcher icon and the file size.
//!
//! Both `.apk` and `.ipa` files are ZIP archives. Android identity lives in
//! the compiled `AndroidManifest.xml` and `resources.arsc`; iOS identity lives
//! in the bundle's `Info.plist`, with an icon in Apple's optimized PNG form.
//!
//! ## Features
//!
//! - ZIP and ZIP64 central directories, STORED and DEFLATE entries
//! - Android binary XML and resource table decoding, density-aware icon lookup
//! - Binary and XML property lists
//! - Reversal of the iOS PNG optimization (`CgBI`)
//!
//! ## Example
//!
//! ```no_run
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let info = pkginfo::parse_package("app.apk").await?;
//!     println!("{} {} ({})", info.bundle_id, info.version, info.build);
//!     Ok(())
//! }
//! ```

pub mod android;
pub mod cli;
pub mod error;
pub mod io;
pub mod ios;
pub mod package;
pub mod platform;
pub mod res;
pub mod scanner;
pub mod zip;

pub use cli::Cli;
pub use error::{Outcome, ParseError};
pub use io::{LocalFileReader, ReadAt};
pub use package::{ICON_DENSITY, PackageArchive, PackageInfo, parse_package};
pub use platform::Platform;
pub use zip::{ZipArchive, ZipEntry};
