use anyhow::{Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// The 8-byte header every resource chunk starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub size: u32,
    /// Offset of the chunk within the buffer it was read from
    pub offset: usize,
}

impl ChunkHeader {
    pub const SIZE: usize = 8;

    /// Read and validate the chunk header at `offset`.
    ///
    /// The whole chunk must fit in `data`.
    pub fn read(data: &[u8], offset: usize) -> Result<Self> {
        if data.len() < offset.saturating_add(Self::SIZE) {
            bail!("Truncated chunk header at offset {:#x}", offset);
        }

        let mut cursor = Cursor::new(&data[offset..]);
        let chunk_type = cursor.read_u16::<LittleEndian>()?;
        let header_size = cursor.read_u16::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;

        if (header_size as usize) < Self::SIZE || header_size as u32 > size {
            bail!(
                "Invalid chunk {:#06x} at offset {:#x}: header size {}, chunk size {}",
                chunk_type,
                offset,
                header_size,
                size
            );
        }
        if size as usize > data.len() - offset {
            bail!(
                "Chunk {:#06x} at offset {:#x} needs {} bytes, only {} available",
                chunk_type,
                offset,
                size,
                data.len() - offset
            );
        }

        Ok(Self {
            chunk_type,
            header_size,
            size,
            offset,
        })
    }

    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }

    /// Offset of the first byte after the header (child chunks or payload)
    pub fn body_start(&self) -> usize {
        self.offset + self.header_size as usize
    }

    /// The full chunk, header included
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.end()]
    }
}

/// Iterator over the sibling chunks laid out in `data[start..end]`.
///
/// Stops after the first malformed header; fewer than 8 trailing bytes are
/// treated as padding.
pub struct Chunks<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

pub fn chunks(data: &[u8], start: usize, end: usize) -> Chunks<'_> {
    Chunks {
        data: &data[..end.min(data.len())],
        pos: start,
        end: end.min(data.len()),
    }
}

impl Iterator for Chunks<'_> {
    type Item = Result<ChunkHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos.saturating_add(ChunkHeader::SIZE) > self.end {
            return None;
        }
        match ChunkHeader::read(self.data, self.pos) {
            Ok(header) => {
                self.pos = header.end();
                Some(Ok(header))
            }
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}
