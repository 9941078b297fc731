use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

use super::StringPool;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

/// A typed `Res_value`: the data type tag plus its 32-bit payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResValue {
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    pub const SIZE: usize = 8;

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let _size = reader.read_u16::<LittleEndian>()?;
        let _res0 = reader.read_u8()?;
        let data_type = reader.read_u8()?;
        let data = reader.read_u32::<LittleEndian>()?;
        Ok(Self { data_type, data })
    }

    /// Resource id this value points at, if it is a (non-null) reference
    pub fn reference(&self) -> Option<u32> {
        match self.data_type {
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE if self.data != 0 => Some(self.data),
            _ => None,
        }
    }

    /// String pool index, if this is a string value
    pub fn string_index(&self) -> Option<u32> {
        (self.data_type == TYPE_STRING).then_some(self.data)
    }

    /// Render the value the way a decompiled manifest shows it.
    pub fn to_text(&self, pool: &StringPool) -> String {
        match self.data_type {
            TYPE_NULL => String::new(),
            TYPE_STRING => pool.get(self.data).unwrap_or_default().to_string(),
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE => format!("@0x{:08X}", self.data),
            TYPE_ATTRIBUTE => format!("?0x{:08X}", self.data),
            TYPE_FLOAT => f32::from_bits(self.data).to_string(),
            TYPE_INT_DEC => (self.data as i32).to_string(),
            TYPE_INT_HEX => format!("0x{:08x}", self.data),
            TYPE_INT_BOOLEAN => (self.data != 0).to_string(),
            _ => format!("0x{:08x}", self.data),
        }
    }
}
