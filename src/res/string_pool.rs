use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::ChunkHeader;

const UTF8_FLAG: u32 = 1 << 8;

/// A decoded `ResStringPool` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    /// Decode the string pool chunk described by `header`.
    pub fn parse(data: &[u8], header: &ChunkHeader) -> Result<Self> {
        let chunk = header.bytes(data);
        let mut cursor = Cursor::new(chunk);
        cursor.set_position(ChunkHeader::SIZE as u64);

        let string_count = cursor.read_u32::<LittleEndian>()? as usize;
        let _style_count = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let strings_start = cursor.read_u32::<LittleEndian>()? as usize;
        let _styles_start = cursor.read_u32::<LittleEndian>()?;

        let offsets_end = (header.header_size as usize).saturating_add(string_count.saturating_mul(4));
        if offsets_end > chunk.len() {
            bail!(
                "String pool declares {} strings but is only {} bytes",
                string_count,
                chunk.len()
            );
        }

        cursor.set_position(header.header_size as u64);
        let mut offsets = vec![0u32; string_count];
        cursor.read_u32_into::<LittleEndian>(&mut offsets)?;

        let utf8 = flags & UTF8_FLAG != 0;
        let mut strings = Vec::with_capacity(string_count);
        for (index, offset) in offsets.into_iter().enumerate() {
            let start = strings_start.saturating_add(offset as usize);
            let string = if utf8 {
                read_utf8(chunk, start)
            } else {
                read_utf16(chunk, start)
            }
            .with_context(|| format!("Invalid string #{} in string pool", index))?;
            strings.push(string);
        }

        Ok(Self { strings })
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// UTF-8 strings carry their UTF-16 length, then their byte length; each
/// length takes one byte, or two when the high bit is set.
fn read_utf8(chunk: &[u8], start: usize) -> Result<String> {
    let mut cursor = Cursor::new(chunk);
    cursor.set_position(start as u64);

    let _char_count = read_utf8_length(&mut cursor)?;
    let byte_count = read_utf8_length(&mut cursor)?;

    let begin = cursor.position() as usize;
    let bytes = chunk
        .get(begin..begin + byte_count)
        .context("String data runs past the end of the pool")?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_utf8_length(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
    let first = cursor.read_u8()? as usize;
    if first & 0x80 == 0 {
        return Ok(first);
    }
    let second = cursor.read_u8()? as usize;
    Ok(((first & 0x7f) << 8) | second)
}

/// UTF-16 strings carry their length in code units, one u16 or two when the
/// high bit is set.
fn read_utf16(chunk: &[u8], start: usize) -> Result<String> {
    let mut cursor = Cursor::new(chunk);
    cursor.set_position(start as u64);

    let first = cursor.read_u16::<LittleEndian>()? as usize;
    let len = if first & 0x8000 == 0 {
        first
    } else {
        let second = cursor.read_u16::<LittleEndian>()? as usize;
        ((first & 0x7fff) << 16) | second
    };

    let begin = cursor.position() as usize;
    if begin.saturating_add(len.saturating_mul(2)) > chunk.len() {
        bail!("String data runs past the end of the pool");
    }
    let mut units = vec![0u16; len];
    cursor.read_u16_into::<LittleEndian>(&mut units)?;
    Ok(String::from_utf16_lossy(&units))
}
