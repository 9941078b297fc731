//! Android compiled resource formats.
//!
//! `aapt` compiles both `AndroidManifest.xml` and the resource table into
//! the same chunked little-endian layout: every chunk starts with a type,
//! a header size and a total size, and may contain child chunks.
//!
//! - [`xml`]: binary XML documents (the manifest)
//! - [`table`]: `resources.arsc`, mapping resource ids to per-configuration values
//! - [`string_pool`], [`value`], [`config`]: building blocks shared by both

mod chunk;
pub mod config;
pub mod string_pool;
pub mod table;
pub mod value;
pub mod xml;

pub use chunk::ChunkHeader;
pub use config::ResConfig;
pub use string_pool::StringPool;
pub use table::ResourceTable;
pub use value::ResValue;
pub use xml::{XmlAttribute, XmlDocument, XmlElement};

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

/// Index value meaning "no string" / "no entry".
pub const NO_INDEX: u32 = 0xFFFF_FFFF;
