//! `resources.arsc` decoding.
//!
//! The table holds a global value string pool followed by one chunk per
//! package. Each package lists, per resource type, one `RES_TABLE_TYPE_TYPE`
//! chunk per configuration; an entry's value in that chunk is the resource's
//! value for that configuration. Only simple (non-bag) values are kept.

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::collections::HashMap;
use std::io::Cursor;

use super::chunk::chunks;
use super::*;

const TYPE_FLAG_SPARSE: u8 = 0x01;
const TYPE_FLAG_OFFSET16: u8 = 0x02;

const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
const ENTRY_FLAG_COMPACT: u16 = 0x0008;

/// Fixed part of a type chunk header before its embedded config.
const TYPE_HEADER_FIXED: usize = 20;

/// A decoded resource table.
#[derive(Debug, Clone)]
pub struct ResourceTable {
    /// Global pool holding string values (including file paths)
    pub strings: StringPool,
    pub packages: Vec<ResPackage>,
}

#[derive(Debug, Clone)]
pub struct ResPackage {
    pub id: u8,
    pub name: String,
    pub types: Vec<ResType>,
}

/// One type chunk: all entries of a resource type for one configuration.
#[derive(Debug, Clone)]
pub struct ResType {
    pub id: u8,
    pub config: ResConfig,
    /// Simple values by entry index; bag entries are left out
    pub entries: HashMap<u16, ResValue>,
}

impl ResourceTable {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = ChunkHeader::read(data, 0).context("Invalid resource table header")?;
        if header.chunk_type != RES_TABLE_TYPE {
            bail!(
                "Not a resource table (chunk type {:#06x})",
                header.chunk_type
            );
        }

        let mut strings = None;
        let mut packages = Vec::new();
        for chunk in chunks(data, header.body_start(), header.end()) {
            let chunk = chunk?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE if strings.is_none() => {
                    strings = Some(StringPool::parse(data, &chunk).context("Invalid global string pool")?);
                }
                RES_TABLE_PACKAGE_TYPE => {
                    let package = ResPackage::parse(data, &chunk)?;
                    debug!(
                        "package {:#04x} ({}) with {} type chunks",
                        package.id,
                        package.name,
                        package.types.len()
                    );
                    packages.push(package);
                }
                other => debug!("skipping resource table chunk {:#06x}", other),
            }
        }

        Ok(Self {
            strings: strings.context("Resource table has no global string pool")?,
            packages,
        })
    }

    /// Every configuration's simple value for resource `id` (`0xPPTTEEEE`).
    pub fn resolve(&self, id: u32) -> Vec<(ResConfig, ResValue)> {
        let package_id = (id >> 24) as u8;
        let type_id = (id >> 16) as u8;
        let entry_id = id as u16;

        self.packages
            .iter()
            .filter(|p| p.id == package_id)
            .flat_map(|p| p.types.iter().filter(|t| t.id == type_id))
            .filter_map(|t| {
                t.entries.get(&entry_id).map(|v| (t.config, *v))
            })
            .collect()
    }

    /// The string a string value points at in the global pool
    pub fn string(&self, value: &ResValue) -> Option<&str> {
        value.string_index().and_then(|i| self.strings.get(i))
    }
}

impl ResPackage {
    /// Package header: id, 128 UTF-16 units of name, then string pool
    /// offsets; type and key pools and the type chunks follow as children.
    fn parse(data: &[u8], header: &ChunkHeader) -> Result<Self> {
        let mut cursor = Cursor::new(header.bytes(data));
        cursor.set_position(ChunkHeader::SIZE as u64);

        let id = cursor.read_u32::<LittleEndian>()?;
        let id = u8::try_from(id).with_context(|| format!("Invalid package id {:#x}", id))?;
        let mut name = [0u16; 128];
        cursor.read_u16_into::<LittleEndian>(&mut name)?;
        let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
        let name = String::from_utf16_lossy(&name[..len]);

        let mut types = Vec::new();
        for chunk in chunks(data, header.body_start(), header.end()) {
            let chunk = chunk?;
            match chunk.chunk_type {
                RES_TABLE_TYPE_TYPE => types.push(
                    ResType::parse(data, &chunk)
                        .with_context(|| format!("Invalid type chunk in package {}", name))?,
                ),
                // type and key name pools, per-type flags
                RES_STRING_POOL_TYPE | RES_TABLE_TYPE_SPEC_TYPE => {}
                other => debug!("skipping package chunk {:#06x}", other),
            }
        }

        Ok(Self { id, name, types })
    }
}

impl ResType {
    fn parse(data: &[u8], header: &ChunkHeader) -> Result<Self> {
        let chunk = header.bytes(data);
        let header_size = header.header_size as usize;
        let mut cursor = Cursor::new(chunk);
        cursor.set_position(ChunkHeader::SIZE as u64);

        let id = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let entry_count = cursor.read_u32::<LittleEndian>()? as usize;
        let entries_start = cursor.read_u32::<LittleEndian>()? as usize;

        if header_size < TYPE_HEADER_FIXED {
            bail!("Type chunk header is only {} bytes", header_size);
        }
        let config = ResConfig::parse(&chunk[TYPE_HEADER_FIXED..header_size])?;

        let offset_width = if flags & (TYPE_FLAG_SPARSE | TYPE_FLAG_OFFSET16) == TYPE_FLAG_OFFSET16 {
            2
        } else {
            4
        };
        if header_size.saturating_add(entry_count.saturating_mul(offset_width)) > chunk.len() {
            bail!("Type {:#04x} declares {} entries but is only {} bytes", id, entry_count, chunk.len());
        }

        cursor.set_position(header_size as u64);
        let mut offsets = Vec::with_capacity(entry_count);
        for index in 0..entry_count {
            if flags & TYPE_FLAG_SPARSE != 0 {
                let index = cursor.read_u16::<LittleEndian>()?;
                let offset = cursor.read_u16::<LittleEndian>()? as usize * 4;
                offsets.push((index, offset));
            } else if flags & TYPE_FLAG_OFFSET16 != 0 {
                let offset = cursor.read_u16::<LittleEndian>()?;
                if offset != 0xffff {
                    offsets.push((index as u16, offset as usize * 4));
                }
            } else {
                let offset = cursor.read_u32::<LittleEndian>()?;
                if offset != NO_INDEX {
                    offsets.push((index as u16, offset as usize));
                }
            }
        }

        let mut entries = HashMap::with_capacity(offsets.len());
        for (index, offset) in offsets {
            let value = read_entry(chunk, entries_start.saturating_add(offset))
                .with_context(|| format!("Invalid entry {} of type {:#04x}", index, id))?;
            if let Some(value) = value {
                entries.insert(index, value);
            }
        }

        Ok(Self { id, config, entries })
    }
}

/// The entry's simple value, or `None` for a bag.
fn read_entry(chunk: &[u8], start: usize) -> Result<Option<ResValue>> {
    let mut cursor = Cursor::new(chunk);
    cursor.set_position(start as u64);

    let size = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let key_or_data = cursor.read_u32::<LittleEndian>()?;

    if flags & ENTRY_FLAG_COMPACT != 0 {
        // Compact entries carry the data type in the high byte of the flags
        // and the data where the key index would be.
        return Ok(Some(ResValue {
            data_type: (flags >> 8) as u8,
            data: key_or_data,
        }));
    }
    if flags & ENTRY_FLAG_COMPLEX != 0 {
        return Ok(None);
    }

    cursor.set_position(start as u64 + size as u64);
    Ok(Some(ResValue::read(&mut cursor)?))
}
