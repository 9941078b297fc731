//! Binary XML ("AXML") decoding.
//!
//! A compiled XML document is a `RES_XML_TYPE` chunk holding a string pool,
//! an optional resource map and a flat sequence of namespace, element and
//! CDATA chunks. Decoding rebuilds the element tree from that sequence;
//! character data is not kept.

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::io::Cursor;

use super::chunk::chunks;
use super::*;

/// Framework attribute ids, used when an obfuscated manifest strips the
/// attribute name from the string pool.
const FRAMEWORK_ATTRIBUTES: &[(u32, &str)] = &[
    (0x0101_0001, "label"),
    (0x0101_0002, "icon"),
    (0x0101_0003, "name"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
];

/// A decoded binary XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Namespace URI, if the element is namespaced
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// Namespace URI, e.g. `http://schemas.android.com/apk/res/android`
    pub namespace: Option<String>,
    pub name: String,
    /// Textual form of the value, as a decompiled manifest would show it
    pub text: String,
    pub value: ResValue,
}

impl XmlElement {
    /// First attribute with this local name, in any namespace
    pub fn attribute(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_text(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.text.as_str())
    }

    /// First direct child with this name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

impl XmlDocument {
    /// Decode a compiled XML document.
    ///
    /// # Errors
    ///
    /// Fails on a wrong document header, malformed chunks, string indices
    /// outside the pool, unbalanced end elements, or a document without
    /// elements.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = ChunkHeader::read(data, 0).context("Invalid binary XML header")?;
        if header.chunk_type != RES_XML_TYPE {
            bail!(
                "Not a binary XML document (chunk type {:#06x})",
                header.chunk_type
            );
        }

        let mut pool: Option<StringPool> = None;
        let mut resource_ids: Vec<u32> = Vec::new();
        let mut open: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        for chunk in chunks(data, header.body_start(), header.end()) {
            let chunk = chunk?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE => {
                    pool = Some(StringPool::parse(data, &chunk)?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    resource_ids = read_resource_map(data, &chunk)?;
                }
                // Namespace URIs are carried on each attribute; prefixes are not needed.
                RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE | RES_XML_CDATA_TYPE => {}
                RES_XML_START_ELEMENT_TYPE => {
                    let pool = pool.as_ref().context("Element appears before the string pool")?;
                    open.push(read_start_element(data, &chunk, pool, &resource_ids)?);
                }
                RES_XML_END_ELEMENT_TYPE => {
                    let element = open
                        .pop()
                        .with_context(|| format!("Unbalanced end element at offset {:#x}", chunk.offset))?;
                    close_element(&mut open, &mut root, element);
                }
                other => debug!("skipping binary XML chunk {:#06x}", other),
            }
        }

        // Some packers drop trailing end-element chunks; close what is still open.
        while let Some(element) = open.pop() {
            debug!("closing unterminated element <{}>", element.name);
            close_element(&mut open, &mut root, element);
        }

        let root = root.context("Binary XML document contains no elements")?;
        Ok(Self { root })
    }
}

fn close_element(open: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => debug!("ignoring extra top-level element <{}>", element.name),
    }
}

fn read_resource_map(data: &[u8], header: &ChunkHeader) -> Result<Vec<u32>> {
    let body = &data[header.body_start()..header.end()];
    let mut ids = vec![0u32; body.len() / 4];
    Cursor::new(body).read_u32_into::<LittleEndian>(&mut ids)?;
    Ok(ids)
}

/// Resolve an optional string reference (`NO_INDEX` means absent).
fn optional_string(pool: &StringPool, index: u32) -> Result<Option<String>> {
    if index == NO_INDEX {
        return Ok(None);
    }
    pool.get(index)
        .map(|s| Some(s.to_string()))
        .with_context(|| format!("String index {} outside pool of {}", index, pool.len()))
}

fn required_string(pool: &StringPool, index: u32) -> Result<String> {
    optional_string(pool, index)?.context("Missing required string reference")
}

/// Element chunks are a 16-byte node header (line number, comment) followed
/// by the element extension and its attribute array.
fn read_start_element(
    data: &[u8],
    header: &ChunkHeader,
    pool: &StringPool,
    resource_ids: &[u32],
) -> Result<XmlElement> {
    let chunk = header.bytes(data);
    let ext_start = header.header_size as u64;
    let mut cursor = Cursor::new(chunk);
    cursor.set_position(ext_start);

    let ns = cursor.read_u32::<LittleEndian>()?;
    let name = cursor.read_u32::<LittleEndian>()?;
    let attribute_start = cursor.read_u16::<LittleEndian>()? as u64;
    let attribute_size = cursor.read_u16::<LittleEndian>()? as u64;
    let attribute_count = cursor.read_u16::<LittleEndian>()? as u64;

    if attribute_count > 0 && attribute_size < 20 {
        bail!("Invalid attribute size {}", attribute_size);
    }
    if ext_start + attribute_start + attribute_size * attribute_count > chunk.len() as u64 {
        bail!("Attributes run past the end of the element chunk");
    }

    let mut element = XmlElement {
        namespace: optional_string(pool, ns)?,
        name: required_string(pool, name).context("Element without a name")?,
        ..Default::default()
    };

    for i in 0..attribute_count {
        cursor.set_position(ext_start + attribute_start + i * attribute_size);
        let ns = cursor.read_u32::<LittleEndian>()?;
        let name_index = cursor.read_u32::<LittleEndian>()?;
        let raw = cursor.read_u32::<LittleEndian>()?;
        let value = ResValue::read(&mut cursor)?;

        let mut name = required_string(pool, name_index)
            .with_context(|| format!("Attribute #{} of <{}>", i, element.name))?;
        if name.is_empty() {
            let known = resource_ids.get(name_index as usize).and_then(|id| {
                FRAMEWORK_ATTRIBUTES
                    .iter()
                    .find(|(attr_id, _)| attr_id == id)
                    .map(|(_, attr_name)| *attr_name)
            });
            if let Some(known) = known {
                name = known.to_string();
            }
        }

        let text = match optional_string(pool, raw)? {
            Some(raw) => raw,
            None => value.to_text(pool),
        };

        element.attributes.push(XmlAttribute {
            namespace: optional_string(pool, ns)?,
            name,
            text,
            value,
        });
    }

    Ok(element)
}
