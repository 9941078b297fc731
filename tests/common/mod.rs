//! Fixture builders shared by the integration tests.
//!
//! Packages are assembled from scratch: compiled XML and resource tables are
//! written chunk by chunk, PNGs are encoded with `image` (or by hand for the
//! optimized iOS form), and everything is zipped with the `zip` crate.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_INT_DEC: u8 = 0x10;

pub const MIPMAP_TYPE: u8 = 0x02;
pub const STRING_TYPE: u8 = 0x03;
pub const ICON_ID: u32 = 0x7f02_0000;
pub const LABEL_ID: u32 = 0x7f03_0000;

/// Wrap `header_ext` and `body` into a chunk with the given type.
fn chunk(chunk_type: u16, header_ext: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = 8 + header_ext.len();
    let mut out = Vec::with_capacity(header_size + body.len());
    out.write_u16::<LittleEndian>(chunk_type).unwrap();
    out.write_u16::<LittleEndian>(header_size as u16).unwrap();
    out.write_u32::<LittleEndian>((header_size + body.len()) as u32).unwrap();
    out.extend_from_slice(header_ext);
    out.extend_from_slice(body);
    out
}

/// A UTF-16 string pool chunk.
pub fn string_pool(strings: &[String]) -> Vec<u8> {
    let mut offsets = Vec::new();
    let mut data = Vec::new();
    for s in strings {
        offsets.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        let units: Vec<u16> = s.encode_utf16().collect();
        data.write_u16::<LittleEndian>(units.len() as u16).unwrap();
        for unit in units {
            data.write_u16::<LittleEndian>(unit).unwrap();
        }
        data.write_u16::<LittleEndian>(0).unwrap();
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let mut ext = Vec::new();
    ext.write_u32::<LittleEndian>(strings.len() as u32).unwrap();
    ext.write_u32::<LittleEndian>(0).unwrap(); // styles
    ext.write_u32::<LittleEndian>(0).unwrap(); // flags: UTF-16
    ext.write_u32::<LittleEndian>((28 + offsets.len()) as u32).unwrap();
    ext.write_u32::<LittleEndian>(0).unwrap();

    let mut body = offsets;
    body.extend(data);
    chunk(0x0001, &ext, &body)
}

fn interned(strings: &mut Vec<String>, s: &str) -> u32 {
    match strings.iter().position(|x| x == s) {
        Some(i) => i as u32,
        None => {
            strings.push(s.to_string());
            (strings.len() - 1) as u32
        }
    }
}

/// An attribute value in a compiled XML element.
#[derive(Debug, Clone, Copy)]
pub enum AttrValue<'a> {
    Str(&'a str),
    Int(u32),
    Ref(u32),
}

/// Builds a compiled XML document; attributes go in the android namespace.
#[derive(Default)]
pub struct AxmlBuilder {
    strings: Vec<String>,
    /// Resource ids of the first pool strings
    resource_ids: Vec<u32>,
    body: Vec<u8>,
}

impl AxmlBuilder {
    pub fn new() -> Self {
        Self::with_resource_map(&[])
    }

    /// A document whose first pool strings are empty attribute names, one per
    /// id, as left behind by manifest obfuscators.
    pub fn with_resource_map(ids: &[u32]) -> Self {
        let mut builder = Self {
            strings: vec![String::new(); ids.len()],
            resource_ids: ids.to_vec(),
            ..Default::default()
        };
        let prefix = interned(&mut builder.strings, "android");
        let uri = interned(&mut builder.strings, ANDROID_NS);
        builder.body.extend(namespace_chunk(0x0100, prefix, uri));
        builder
    }

    pub fn start(mut self, name: &str, attrs: &[(&str, AttrValue)]) -> Self {
        let attrs: Vec<(u32, AttrValue)> = attrs
            .iter()
            .map(|(attr_name, value)| (interned(&mut self.strings, attr_name), *value))
            .collect();
        self.start_element(name, &attrs)
    }

    /// Start an element whose attribute names are known only by resource id.
    pub fn start_mapped(self, name: &str, attrs: &[(u32, AttrValue)]) -> Self {
        let attrs: Vec<(u32, AttrValue)> = attrs
            .iter()
            .map(|(id, value)| {
                let slot = self
                    .resource_ids
                    .iter()
                    .position(|x| x == id)
                    .expect("id missing from the resource map");
                (slot as u32, *value)
            })
            .collect();
        self.start_element(name, &attrs)
    }

    fn start_element(mut self, name: &str, attrs: &[(u32, AttrValue)]) -> Self {
        let uri = interned(&mut self.strings, ANDROID_NS);
        let name = interned(&mut self.strings, name);

        let mut ext = Vec::new();
        ext.write_u32::<LittleEndian>(NO_INDEX).unwrap();
        ext.write_u32::<LittleEndian>(name).unwrap();
        ext.write_u16::<LittleEndian>(20).unwrap(); // attributeStart
        ext.write_u16::<LittleEndian>(20).unwrap(); // attributeSize
        ext.write_u16::<LittleEndian>(attrs.len() as u16).unwrap();
        ext.write_u16::<LittleEndian>(0).unwrap(); // id
        ext.write_u16::<LittleEndian>(0).unwrap(); // class
        ext.write_u16::<LittleEndian>(0).unwrap(); // style

        for &(attr_name, value) in attrs {
            let (raw, data_type, data) = match value {
                AttrValue::Str(s) => {
                    let index = interned(&mut self.strings, s);
                    (index, TYPE_STRING, index)
                }
                AttrValue::Int(v) => (NO_INDEX, TYPE_INT_DEC, v),
                AttrValue::Ref(id) => (NO_INDEX, TYPE_REFERENCE, id),
            };
            ext.write_u32::<LittleEndian>(uri).unwrap();
            ext.write_u32::<LittleEndian>(attr_name).unwrap();
            ext.write_u32::<LittleEndian>(raw).unwrap();
            ext.write_u16::<LittleEndian>(8).unwrap();
            ext.write_u8(0).unwrap();
            ext.write_u8(data_type).unwrap();
            ext.write_u32::<LittleEndian>(data).unwrap();
        }

        self.body.extend(chunk(0x0102, &node_header(), &ext));
        self
    }

    pub fn end(mut self, name: &str) -> Self {
        let name = interned(&mut self.strings, name);
        let mut ext = Vec::new();
        ext.write_u32::<LittleEndian>(NO_INDEX).unwrap();
        ext.write_u32::<LittleEndian>(name).unwrap();
        self.body.extend(chunk(0x0103, &node_header(), &ext));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let prefix = interned(&mut self.strings, "android");
        let uri = interned(&mut self.strings, ANDROID_NS);
        self.body.extend(namespace_chunk(0x0101, prefix, uri));

        let mut body = string_pool(&self.strings);
        if !self.resource_ids.is_empty() {
            let mut ids = Vec::new();
            for id in &self.resource_ids {
                ids.write_u32::<LittleEndian>(*id).unwrap();
            }
            body.extend(chunk(0x0180, &[], &ids));
        }
        body.extend(self.body);
        chunk(0x0003, &[], &body)
    }
}

/// Line number and comment of an XML node chunk.
fn node_header() -> Vec<u8> {
    let mut header = Vec::new();
    header.write_u32::<LittleEndian>(1).unwrap();
    header.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    header
}

fn namespace_chunk(chunk_type: u16, prefix: u32, uri: u32) -> Vec<u8> {
    let mut ext = Vec::new();
    ext.write_u32::<LittleEndian>(prefix).unwrap();
    ext.write_u32::<LittleEndian>(uri).unwrap();
    chunk(chunk_type, &node_header(), &ext)
}

/// A manifest with the identity attributes and an `<application>` element.
pub fn manifest(package: &str, version_name: &str, version_code: u32, app_attrs: &[(&str, AttrValue)]) -> Vec<u8> {
    AxmlBuilder::new()
        .start(
            "manifest",
            &[
                ("versionCode", AttrValue::Int(version_code)),
                ("versionName", AttrValue::Str(version_name)),
                ("package", AttrValue::Str(package)),
            ],
        )
        .start("application", app_attrs)
        .end("application")
        .end("manifest")
        .build()
}

/// Configuration qualifiers a fixture value is stored under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    pub language: [u8; 2],
    pub density: u16,
}

impl Config {
    pub fn density(density: u16) -> Self {
        Self {
            density,
            ..Default::default()
        }
    }

    pub fn language(language: &str) -> Self {
        let bytes = language.as_bytes();
        Self {
            language: [bytes[0], bytes[1]],
            ..Default::default()
        }
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.write_u32::<LittleEndian>(64).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap(); // mcc, mnc
        out.extend_from_slice(&self.language);
        out.extend_from_slice(&[0, 0]); // country
        out.write_u8(0).unwrap(); // orientation
        out.write_u8(0).unwrap(); // touchscreen
        out.write_u16::<LittleEndian>(self.density).unwrap();
        out.resize(64, 0);
        out
    }
}

/// How a type chunk locates its entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryLayout {
    /// One u32 offset per index, `NO_INDEX` for holes
    #[default]
    Dense,
    /// (index, offset / 4) pairs for present entries only
    Sparse,
    /// One u16 offset / 4 per index, `0xffff` for holes
    Offset16,
}

/// Builds a `resources.arsc` with one package (`0x7f`).
#[derive(Default)]
pub struct ArscBuilder {
    strings: Vec<String>,
    /// (type id, entry index, config, data type, data)
    values: Vec<(u8, u16, Config, u8, u32)>,
    layout: EntryLayout,
    compact: bool,
}

impl ArscBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(mut self, layout: EntryLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Write entries in the 8-byte compact form.
    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }

    /// Store a string (or file path) value for resource `id`.
    pub fn string(mut self, id: u32, config: Config, value: &str) -> Self {
        let index = interned(&mut self.strings, value);
        self.values
            .push(((id >> 16) as u8, id as u16, config, TYPE_STRING, index));
        self
    }

    /// Store a reference to resource `target` as the value of `id`.
    pub fn reference(mut self, id: u32, config: Config, target: u32) -> Self {
        self.values
            .push(((id >> 16) as u8, id as u16, config, TYPE_REFERENCE, target));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let type_names = ["attr", "mipmap", "string"].map(String::from);
        let key_names = ["ic_launcher", "app_name"].map(String::from);

        let mut package_body = string_pool(&type_names);
        let key_strings_offset = 288 + package_body.len();
        package_body.extend(string_pool(&key_names));

        let mut type_ids: Vec<u8> = self.values.iter().map(|v| v.0).collect();
        type_ids.sort_unstable();
        type_ids.dedup();

        for type_id in type_ids {
            let entry_count = self
                .values
                .iter()
                .filter(|v| v.0 == type_id)
                .map(|v| v.1 as u32 + 1)
                .max()
                .unwrap_or(0);
            package_body.extend(type_spec_chunk(type_id, entry_count));

            let mut configs: Vec<Config> = Vec::new();
            for value in self.values.iter().filter(|v| v.0 == type_id) {
                if !configs.contains(&value.2) {
                    configs.push(value.2);
                }
            }
            for config in configs {
                let entries: Vec<(u16, u8, u32)> = self
                    .values
                    .iter()
                    .filter(|v| v.0 == type_id && v.2 == config)
                    .map(|v| (v.1, v.3, v.4))
                    .collect();
                package_body.extend(type_chunk(
                    type_id,
                    entry_count,
                    config,
                    &entries,
                    self.layout,
                    self.compact,
                ));
            }
        }

        let mut package_ext = Vec::new();
        package_ext.write_u32::<LittleEndian>(0x7f).unwrap();
        let mut name: Vec<u16> = "com.example.app".encode_utf16().collect();
        name.resize(128, 0);
        for unit in name {
            package_ext.write_u16::<LittleEndian>(unit).unwrap();
        }
        package_ext.write_u32::<LittleEndian>(288).unwrap(); // typeStrings
        package_ext.write_u32::<LittleEndian>(0).unwrap();
        package_ext
            .write_u32::<LittleEndian>(key_strings_offset as u32)
            .unwrap();
        package_ext.write_u32::<LittleEndian>(0).unwrap();
        package_ext.write_u32::<LittleEndian>(0).unwrap(); // typeIdOffset
        let package = chunk(0x0200, &package_ext, &package_body);

        let mut table_ext = Vec::new();
        table_ext.write_u32::<LittleEndian>(1).unwrap(); // package count
        let mut table_body = string_pool(&self.strings);
        table_body.extend(package);
        chunk(0x0002, &table_ext, &table_body)
    }
}

fn type_spec_chunk(type_id: u8, entry_count: u32) -> Vec<u8> {
    let mut ext = Vec::new();
    ext.write_u8(type_id).unwrap();
    ext.write_u8(0).unwrap();
    ext.write_u16::<LittleEndian>(0).unwrap();
    ext.write_u32::<LittleEndian>(entry_count).unwrap();
    let body = vec![0u8; entry_count as usize * 4];
    chunk(0x0202, &ext, &body)
}

/// A type chunk holding simple entries.
fn type_chunk(
    type_id: u8,
    entry_count: u32,
    config: Config,
    entries: &[(u16, u8, u32)],
    layout: EntryLayout,
    compact: bool,
) -> Vec<u8> {
    let mut data = Vec::new();
    let mut located = Vec::new();
    for &(index, data_type, value) in entries {
        located.push((index, data.len() as u32));
        if compact {
            data.write_u16::<LittleEndian>(index).unwrap(); // key
            data.write_u16::<LittleEndian>(0x0008 | (data_type as u16) << 8).unwrap();
            data.write_u32::<LittleEndian>(value).unwrap();
        } else {
            data.write_u16::<LittleEndian>(8).unwrap(); // entry size
            data.write_u16::<LittleEndian>(0).unwrap(); // flags
            data.write_u32::<LittleEndian>(index as u32).unwrap(); // key
            data.write_u16::<LittleEndian>(8).unwrap();
            data.write_u8(0).unwrap();
            data.write_u8(data_type).unwrap();
            data.write_u32::<LittleEndian>(value).unwrap();
        }
    }

    let mut offsets = Vec::new();
    let (flags, count) = match layout {
        EntryLayout::Dense => {
            let mut dense = vec![NO_INDEX; entry_count as usize];
            for &(index, offset) in &located {
                dense[index as usize] = offset;
            }
            for offset in dense {
                offsets.write_u32::<LittleEndian>(offset).unwrap();
            }
            (0u8, entry_count)
        }
        EntryLayout::Sparse => {
            for &(index, offset) in &located {
                offsets.write_u16::<LittleEndian>(index).unwrap();
                offsets.write_u16::<LittleEndian>((offset / 4) as u16).unwrap();
            }
            (0x01, located.len() as u32)
        }
        EntryLayout::Offset16 => {
            let mut dense = vec![0xffffu16; entry_count as usize];
            for &(index, offset) in &located {
                dense[index as usize] = (offset / 4) as u16;
            }
            for offset in dense {
                offsets.write_u16::<LittleEndian>(offset).unwrap();
            }
            (0x02, entry_count)
        }
    };
    while offsets.len() % 4 != 0 {
        offsets.push(0);
    }

    let header_size = 20 + 64;
    let entries_start = header_size + offsets.len();

    let mut ext = Vec::new();
    ext.write_u8(type_id).unwrap();
    ext.write_u8(flags).unwrap();
    ext.write_u16::<LittleEndian>(0).unwrap();
    ext.write_u32::<LittleEndian>(count).unwrap();
    ext.write_u32::<LittleEndian>(entries_start as u32).unwrap();
    ext.extend(config.to_bytes());

    let mut body = offsets;
    body.extend(data);
    chunk(0x0201, &ext, &body)
}

/// A standard PNG filled with one colour.
pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);

    let mut out = Vec::new();
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
    out
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn ihdr(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]); // 8-bit RGBA
    data
}

/// An Xcode-optimized PNG of one RGBA colour: `CgBI` chunk, premultiplied
/// BGRA pixels and a raw deflate stream.
pub fn cgbi_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let premultiply = |c: u8| ((c as u32 * color[3] as u32 + 127) / 255) as u8;
    let [r, g, b, a] = color;
    let [r, g, b] = [premultiply(r), premultiply(g), premultiply(b)];
    let mut rows = Vec::new();
    for _ in 0..height {
        rows.push(0);
        for _ in 0..width {
            rows.extend_from_slice(&[b, g, r, a]);
        }
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&rows).unwrap();
    let idat = encoder.finish().unwrap();

    let mut out = PNG_SIGNATURE.to_vec();
    out.extend(png_chunk(b"CgBI", &[0x50, 0x00, 0x20, 0x06]));
    out.extend(png_chunk(b"IHDR", &ihdr(width, height)));
    out.extend(png_chunk(b"IDAT", &idat));
    out.extend(png_chunk(b"IEND", &[]));
    out
}

/// A standard PNG with a `CgBI` chunk inserted after the signature.
///
/// Its image data is zlib-wrapped, so restoring it fails while the data
/// itself still decodes.
pub fn png_with_cgbi_marker(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let standard = png(width, height, color);
    let mut out = PNG_SIGNATURE.to_vec();
    out.extend(png_chunk(b"CgBI", &[0x50, 0x00, 0x20, 0x06]));
    out.extend_from_slice(&standard[8..]);
    out
}

/// An XML property list holding string values.
pub fn plist_xml(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut out = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
        "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        "<plist version=\"1.0\">\n<dict>\n",
    ));
    for (key, value) in pairs {
        out.push_str(&format!("\t<key>{key}</key>\n\t<string>{value}</string>\n"));
    }
    out.push_str("</dict>\n</plist>\n");
    out.into_bytes()
}

/// A binary property list holding string values.
pub fn plist_binary(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    for (key, value) in pairs {
        dict.insert(key.to_string(), plist::Value::String(value.to_string()));
    }
    let mut out = Vec::new();
    plist::Value::Dictionary(dict)
        .to_writer_binary(&mut out)
        .unwrap();
    out
}

/// Write a ZIP archive at `path`, deflating entries when `deflate` is set.
pub fn write_zip(path: &Path, files: &[(&str, &[u8])], deflate: bool) {
    let method = if deflate {
        zip::CompressionMethod::Deflated
    } else {
        zip::CompressionMethod::Stored
    };
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, data) in files {
        let options = zip::write::SimpleFileOptions::default().compression_method(method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// The resource table of the example APK: a localized label and launcher
/// icons at mdpi and xxxhdpi.
pub fn example_resources() -> Vec<u8> {
    ArscBuilder::new()
        .string(LABEL_ID, Config::language("de"), "Beispiel")
        .string(LABEL_ID, Config::default(), "Example")
        .string(ICON_ID, Config::density(160), "res/mipmap-mdpi-v4/ic_launcher.png")
        .string(ICON_ID, Config::density(640), "res/mipmap-xxxhdpi-v4/ic_launcher.png")
        .build()
}

/// The manifest of the example APK.
pub fn example_manifest() -> Vec<u8> {
    manifest(
        "com.example.app",
        "1.2.3",
        7,
        &[("label", AttrValue::Ref(LABEL_ID)), ("icon", AttrValue::Ref(ICON_ID))],
    )
}

/// Write `app.apk` into `dir`: com.example.app 1.2.3 (7) labelled "Example",
/// with a 48px mdpi and a 192px xxxhdpi icon.
pub fn example_apk(dir: &Path, deflate: bool) -> PathBuf {
    let manifest = example_manifest();
    let resources = example_resources();
    let mdpi = png(48, 48, [0, 128, 0, 255]);
    let xxxhdpi = png(192, 192, [0, 128, 0, 255]);

    let path = dir.join("app.apk");
    write_zip(
        &path,
        &[
            ("AndroidManifest.xml", manifest.as_slice()),
            ("classes.dex", &b"dex\n035\0"[..]),
            ("resources.arsc", resources.as_slice()),
            ("res/mipmap-mdpi-v4/ic_launcher.png", mdpi.as_slice()),
            ("res/mipmap-xxxhdpi-v4/ic_launcher.png", xxxhdpi.as_slice()),
        ],
        deflate,
    );
    path
}

/// Write `App.ipa` into `dir` with the given plist and icon bytes.
pub fn ipa(dir: &Path, plist: &[u8], icon: Option<&[u8]>) -> PathBuf {
    let path = dir.join("App.ipa");
    let mut files: Vec<(&str, &[u8])> = vec![
        ("Payload/Example.app/Info.plist", plist),
        ("Payload/Example.app/Example", &b"\xcf\xfa\xed\xfe"[..]),
    ];
    if let Some(icon) = icon {
        files.push(("Payload/Example.app/AppIcon60x60@2x.png", icon));
    }
    write_zip(&path, &files, true);
    path
}
