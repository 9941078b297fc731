//! Main entry point for the pkginfo CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use image::{GenericImageView, ImageOutputFormat};
use log::info;
use std::io::Cursor;
use std::path::Path;

use pkginfo::{Cli, PackageInfo, parse_package};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_target(false)
        .init();

    let info = parse_package(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    if let Some(ref path) = cli.icon {
        write_icon(&info, path).await?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }

    Ok(())
}

/// Encode the icon as PNG and write it to `path`.
async fn write_icon(info: &PackageInfo, path: &Path) -> Result<()> {
    let icon = info.icon.as_ref().context("Package has no icon")?;
    let mut png = Cursor::new(Vec::new());
    icon.write_to(&mut png, ImageOutputFormat::Png)
        .context("Failed to encode icon")?;
    tokio::fs::write(path, png.into_inner())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("icon written to {}", path.display());
    Ok(())
}

fn print_info(info: &PackageInfo) {
    println!("{:>9}  {}", "Name:", info.name);
    println!("{:>9}  {}", "Bundle:", info.bundle_id);
    println!("{:>9}  {}", "Version:", info.version);
    println!("{:>9}  {}", "Build:", info.build);
    if let Some(ref icon) = info.icon {
        println!("{:>9}  {}x{}", "Icon:", icon.width(), icon.height());
    }
    println!("{:>9}  {}", "Size:", format_size(info.size));
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
