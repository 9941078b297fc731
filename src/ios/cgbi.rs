//! Reversal of Apple's PNG optimization ("CgBI").
//!
//! Xcode rewrites bundle PNGs for the device: it inserts a `CgBI` chunk
//! before `IHDR`, compresses the image data as a raw deflate stream without
//! the zlib wrapper, and stores pixels as BGR(A). Standard decoders reject
//! such files. Colour channels of RGBA images are also premultiplied by
//! alpha.
//!
//! Reverting drops `CgBI`, undoes the scanline filters, swaps red and blue
//! back, divides translucent pixels by their alpha and re-compresses the
//! unfiltered rows with zlib.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::ZlibEncoder;
use std::io::{self, Read, Write};
use thiserror::Error;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const CHUNK_CGBI: [u8; 4] = *b"CgBI";
const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

/// Chunks larger than this are rejected rather than buffered.
const MAX_CHUNK_LEN: u32 = 0x7fff_ffff;

const COLOR_TYPE_RGB: u8 = 2;
const COLOR_TYPE_RGBA: u8 = 6;

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

#[derive(Debug, Error)]
pub enum RevertError {
    #[error("not a png file")]
    Signature,
    #[error("png chunk is truncated")]
    Truncated,
    #[error("png chunk {} declares {len} bytes", String::from_utf8_lossy(.kind))]
    ChunkTooLarge { kind: [u8; 4], len: u32 },
    #[error("png has no IHDR chunk before its image data")]
    MissingHeader,
    #[error("invalid IHDR chunk")]
    InvalidHeader,
    /// The image data could not be restored; the output holds the chunk
    /// layout with the original image data.
    #[error("bad image data: {0}")]
    ImageData(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Coarse classification of [`RevertError`] for tolerance decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertErrorKind {
    /// The image data itself is off; the partial output may still decode
    Data,
    Other,
}

impl RevertError {
    pub fn kind(&self) -> RevertErrorKind {
        match self {
            RevertError::ImageData(_) => RevertErrorKind::Data,
            _ => RevertErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageHeader {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
}

impl ImageHeader {
    fn parse(data: &[u8]) -> Result<Self, RevertError> {
        if data.len() != 13 {
            return Err(RevertError::InvalidHeader);
        }
        let mut cursor = data;
        let width = cursor.read_u32::<BigEndian>()?;
        let height = cursor.read_u32::<BigEndian>()?;
        let bit_depth = cursor.read_u8()?;
        let color_type = cursor.read_u8()?;
        let _compression = cursor.read_u8()?;
        let _filter = cursor.read_u8()?;
        let interlace = cursor.read_u8()?;
        if width == 0 || height == 0 {
            return Err(RevertError::InvalidHeader);
        }
        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
        })
    }

    fn bytes_per_pixel(&self) -> Option<usize> {
        match (self.color_type, self.bit_depth) {
            (COLOR_TYPE_RGBA, 8) => Some(4),
            (COLOR_TYPE_RGB, 8) => Some(3),
            _ => None,
        }
    }
}

struct Chunk {
    kind: [u8; 4],
    data: Vec<u8>,
}

fn read_chunk<R: Read>(reader: &mut R) -> Result<Chunk, RevertError> {
    let len = reader.read_u32::<BigEndian>().map_err(truncated)?;
    let mut kind = [0u8; 4];
    reader.read_exact(&mut kind).map_err(truncated)?;
    if len > MAX_CHUNK_LEN {
        return Err(RevertError::ChunkTooLarge { kind, len });
    }

    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len as usize {
        return Err(RevertError::Truncated);
    }
    let _crc = reader.read_u32::<BigEndian>().map_err(truncated)?;
    Ok(Chunk { kind, data })
}

fn truncated(err: io::Error) -> RevertError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        RevertError::Truncated
    } else {
        RevertError::Io(err)
    }
}

fn write_chunk<W: Write>(writer: &mut W, kind: &[u8; 4], data: &[u8]) -> io::Result<()> {
    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);

    writer.write_u32::<BigEndian>(data.len() as u32)?;
    writer.write_all(kind)?;
    writer.write_all(data)?;
    writer.write_u32::<BigEndian>(crc.finalize())
}

/// Rewrite an optimized PNG from `reader` as a standard PNG into `writer`.
///
/// PNGs without a `CgBI` chunk are copied with their image data untouched.
///
/// # Errors
///
/// [`RevertError::ImageData`] when the image data cannot be restored; by
/// then `writer` has received a complete PNG carrying the original image
/// data. Any other error leaves `writer` with an incomplete stream.
pub fn revert_optimization<R: Read, W: Write>(mut reader: R, mut writer: W) -> Result<(), RevertError> {
    let mut signature = [0u8; 8];
    reader.read_exact(&mut signature).map_err(|e| match truncated(e) {
        RevertError::Truncated => RevertError::Signature,
        other => other,
    })?;
    if signature != PNG_SIGNATURE {
        return Err(RevertError::Signature);
    }
    writer.write_all(&signature)?;

    let mut optimized = false;
    let mut header: Option<ImageHeader> = None;
    let mut image_data = Vec::new();

    loop {
        let chunk = read_chunk(&mut reader)?;
        match chunk.kind {
            CHUNK_CGBI => optimized = true,
            CHUNK_IHDR => {
                header = Some(ImageHeader::parse(&chunk.data)?);
                write_chunk(&mut writer, &chunk.kind, &chunk.data)?;
            }
            CHUNK_IDAT => {
                if header.is_none() {
                    return Err(RevertError::MissingHeader);
                }
                image_data.extend_from_slice(&chunk.data);
            }
            CHUNK_IEND => {
                let header = header.ok_or(RevertError::MissingHeader)?;
                if !optimized {
                    write_chunk(&mut writer, &CHUNK_IDAT, &image_data)?;
                    write_chunk(&mut writer, &CHUNK_IEND, &[])?;
                    return Ok(());
                }
                return match restore_image_data(&image_data, &header) {
                    Ok(restored) => {
                        write_chunk(&mut writer, &CHUNK_IDAT, &restored)?;
                        write_chunk(&mut writer, &CHUNK_IEND, &[])?;
                        Ok(())
                    }
                    Err(err) => {
                        write_chunk(&mut writer, &CHUNK_IDAT, &image_data)?;
                        write_chunk(&mut writer, &CHUNK_IEND, &[])?;
                        Err(err)
                    }
                };
            }
            _ => write_chunk(&mut writer, &chunk.kind, &chunk.data)?,
        }
    }
}

/// Inflate the raw deflate stream, restore every pixel to straight RGB(A)
/// and re-compress with a zlib wrapper.
fn restore_image_data(data: &[u8], header: &ImageHeader) -> Result<Vec<u8>, RevertError> {
    let bpp = header.bytes_per_pixel().ok_or_else(|| {
        RevertError::ImageData(format!(
            "unsupported pixel layout (color type {}, bit depth {})",
            header.color_type, header.bit_depth
        ))
    })?;
    if header.interlace != 0 {
        return Err(RevertError::ImageData("interlaced image".to_string()));
    }

    let stride = (header.width as usize)
        .checked_mul(bpp)
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| RevertError::ImageData("image too large".to_string()))?;
    let expected = stride
        .checked_mul(header.height as usize)
        .ok_or_else(|| RevertError::ImageData("image too large".to_string()))?;

    let mut pixels = Vec::with_capacity(expected.min(64 * 1024 * 1024));
    DeflateDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut pixels)
        .map_err(|e| RevertError::ImageData(format!("cannot inflate image data: {e}")))?;
    if pixels.len() != expected {
        return Err(RevertError::ImageData(format!(
            "expected {} bytes of image data, got {}",
            expected,
            pixels.len()
        )));
    }

    unfilter(&mut pixels, stride, bpp)?;
    for row in pixels.chunks_exact_mut(stride) {
        for pixel in row[1..].chunks_exact_mut(bpp) {
            pixel.swap(0, 2);
            if bpp == 4 {
                unpremultiply(pixel);
            }
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::default());
    encoder.write_all(&pixels)?;
    Ok(encoder.finish()?)
}

/// Undo each row's filter in place and mark the row unfiltered.
fn unfilter(pixels: &mut [u8], stride: usize, bpp: usize) -> Result<(), RevertError> {
    let mut previous = vec![0u8; stride - 1];
    for (y, row) in pixels.chunks_exact_mut(stride).enumerate() {
        let (filter, line) = row.split_at_mut(1);
        match filter[0] {
            FILTER_NONE => {}
            FILTER_SUB => {
                for i in bpp..line.len() {
                    line[i] = line[i].wrapping_add(line[i - bpp]);
                }
            }
            FILTER_UP => {
                for (byte, up) in line.iter_mut().zip(&previous) {
                    *byte = byte.wrapping_add(*up);
                }
            }
            FILTER_AVERAGE => {
                for i in 0..line.len() {
                    let left = if i >= bpp { line[i - bpp] } else { 0 };
                    let average = (u16::from(left) + u16::from(previous[i])) / 2;
                    line[i] = line[i].wrapping_add(average as u8);
                }
            }
            FILTER_PAETH => {
                for i in 0..line.len() {
                    let (left, up_left) = if i >= bpp {
                        (line[i - bpp], previous[i - bpp])
                    } else {
                        (0, 0)
                    };
                    line[i] = line[i].wrapping_add(paeth(left, previous[i], up_left));
                }
            }
            other => {
                return Err(RevertError::ImageData(format!(
                    "unknown filter type {} on row {}",
                    other, y
                )));
            }
        }
        filter[0] = FILTER_NONE;
        previous.copy_from_slice(line);
    }
    Ok(())
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let to_left = (estimate - i16::from(left)).abs();
    let to_up = (estimate - i16::from(up)).abs();
    let to_up_left = (estimate - i16::from(up_left)).abs();
    if to_left <= to_up && to_left <= to_up_left {
        left
    } else if to_up <= to_up_left {
        up
    } else {
        up_left
    }
}

/// Divide the colour channels of an RGBA pixel by its alpha. Opaque and
/// fully transparent pixels are left alone.
fn unpremultiply(pixel: &mut [u8]) {
    let alpha = u32::from(pixel[3]);
    if alpha == 0 || alpha == 255 {
        return;
    }
    for channel in &mut pixel[..3] {
        let straight = (u32::from(*channel) * 255 + alpha / 2) / alpha;
        *channel = straight.min(255) as u8;
    }
}
