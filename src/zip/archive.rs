use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipEntry};

/// Upper bound for trusting a declared size when preallocating.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// An opened ZIP archive with its central directory already listed.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipEntry>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Read the central directory of the archive behind `reader`.
    pub async fn new(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_entries().await?;
        Ok(Self { parser, entries })
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// First entry with exactly this name
    pub fn by_name(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Size of the underlying file in bytes
    pub fn size(&self) -> u64 {
        self.parser.size()
    }

    /// Read and decompress one entry fully into memory.
    ///
    /// The decompressed length and CRC-32 are checked against the central
    /// directory.
    pub async fn read_entry(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.data_offset(entry).await?;

        match data_offset.checked_add(entry.compressed_size) {
            Some(end) if end <= self.size() => {}
            _ => bail!(
                "Entry {} ({} bytes at offset {}) extends past the end of the archive",
                entry.name,
                entry.compressed_size,
                data_offset
            ),
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut raw).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size.min(MAX_PREALLOC) as usize);
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size)
                    .read_to_end(&mut out)
                    .with_context(|| format!("Failed to inflate {}", entry.name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!("Unsupported compression method {} for {}", method, entry.name)
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "Entry {} decompressed to {} bytes, expected {}",
                entry.name,
                data.len(),
                entry.uncompressed_size
            );
        }
        if crc32fast::hash(&data) != entry.crc32 {
            bail!("CRC-32 mismatch for {}", entry.name);
        }

        Ok(data)
    }
}
