//! Table definitions
//!
//! A table's schema is stored in one or more definition records, numbered by
//! block. The blocks are concatenated in block order and parsed as a single
//! little-endian structure:
//!
//! ```text
//! u16 driver version, u16 record length, u16 field count, u16 memo count,
//! u16 index count
//! field:  u8 type, u16 offset, zstring name, u16 elements, u16 length,
//!         u16 flags, u16 field number, then per type:
//!           Decimal  u8 places, u8 bytes per element
//!           strings  u16 string length, zstring picture, pad byte if no picture
//! memo:   zstring external file (empty: one byte 1), zstring name,
//!         u16 length, u16 flags
//! index:  zstring external file (empty: one byte 1), zstring name, u8 flags,
//!         u16 key count, (u16 field number, u16 flags) per key field
//! ```

use byteorder::LittleEndian;
use serde::Serialize;
use std::iter::Peekable;

use crate::error::{TpsError, TpsResult};
use crate::storage::reader::ByteReader;
use crate::types::{Endian, FieldType};

bitflags::bitflags! {
    /// Memo descriptor flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct MemoFlags: u16 {
        /// Binary contents with a length prefix instead of text
        const BLOB = 0x0004;
    }
}

/// Layout of one field inside a data record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Byte offset in the record, or in the enclosing group for members
    pub offset: u16,
    /// Total width including all elements
    pub length: u16,
    pub elements: u16,
    pub flags: u16,
    pub number: u16,
    /// Digits after the decimal point (Decimal only)
    pub places: u8,
    /// Width of the character data (string types only)
    pub string_length: u16,
    pub picture: String,
    /// Byte order of the field's integers and reals.
    ///
    /// Definition records carry no byte-order flag, so parsed descriptors are
    /// always little-endian. Descriptors built by hand for big-endian spans,
    /// such as the record number trailing an index key, set [`Endian::Big`].
    pub endian: Endian,
    /// Members of a group, offsets relative to the group
    pub members: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    pub fn is_array(&self) -> bool {
        self.elements > 1
    }

    /// Width of a single element
    pub fn element_length(&self) -> u16 {
        self.length / self.elements.max(1)
    }

    fn parse(rx: &mut ByteReader<'_>) -> TpsResult<Self> {
        let code = rx.read_u8()?;
        let offset = rx.read_u16::<LittleEndian>()?;
        let name = rx.read_zstring()?;
        let field_type = FieldType::from_code(code).ok_or_else(|| {
            TpsError::FormatMismatch(format!(
                "field '{}' has unknown type code 0x{:02X}",
                name, code
            ))
        })?;
        let elements = rx.read_u16::<LittleEndian>()?;
        let length = rx.read_u16::<LittleEndian>()?;
        let flags = rx.read_u16::<LittleEndian>()?;
        let number = rx.read_u16::<LittleEndian>()?;

        let mut field = FieldDescriptor {
            name,
            field_type,
            offset,
            length,
            elements,
            flags,
            number,
            places: 0,
            string_length: 0,
            picture: String::new(),
            endian: Endian::Little,
            members: Vec::new(),
        };

        match field_type {
            FieldType::Decimal => {
                field.places = rx.read_u8()?;
                let _bytes_per_element = rx.read_u8()?;
            }
            ty if ty.is_string() => {
                field.string_length = rx.read_u16::<LittleEndian>()?;
                field.picture = rx.read_zstring()?;
                if field.picture.is_empty() {
                    rx.read_u8()?;
                }
            }
            _ => {}
        }

        Ok(field)
    }
}

/// A memo or blob column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoDescriptor {
    pub name: String,
    /// Ordinal used in memo record headers
    pub index: u32,
    /// Name of an external memo file, empty when stored in this file
    pub external_file: String,
    pub length: u16,
    pub flags: MemoFlags,
}

impl MemoDescriptor {
    pub fn is_blob(&self) -> bool {
        self.flags.contains(MemoFlags::BLOB)
    }

    fn parse(rx: &mut ByteReader<'_>, index: u32) -> TpsResult<Self> {
        let external_file = read_external_file(rx, "memo")?;
        let name = rx.read_zstring()?;
        let length = rx.read_u16::<LittleEndian>()?;
        let flags = MemoFlags::from_bits_retain(rx.read_u16::<LittleEndian>()?);
        Ok(MemoDescriptor {
            name,
            index,
            external_file,
            length,
            flags,
        })
    }
}

/// One component of an index key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyField {
    pub field_number: u16,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub external_file: String,
    pub flags: u8,
    pub key_fields: Vec<KeyField>,
}

impl IndexDescriptor {
    fn parse(rx: &mut ByteReader<'_>) -> TpsResult<Self> {
        let external_file = read_external_file(rx, "index")?;
        let name = rx.read_zstring()?;
        let flags = rx.read_u8()?;
        let key_count = rx.read_u16::<LittleEndian>()?;
        let mut key_fields = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            key_fields.push(KeyField {
                field_number: rx.read_u16::<LittleEndian>()?,
                flags: rx.read_u16::<LittleEndian>()?,
            });
        }
        Ok(IndexDescriptor {
            name,
            external_file,
            flags,
            key_fields,
        })
    }
}

fn read_external_file(rx: &mut ByteReader<'_>, what: &str) -> TpsResult<String> {
    let external = rx.read_zstring()?;
    if external.is_empty() {
        let marker = rx.read_u8()?;
        if marker != 1 {
            return Err(TpsError::FormatMismatch(format!(
                "{} descriptor without external file has marker {} instead of 1",
                what, marker
            )));
        }
    }
    Ok(external)
}

/// Schema of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub table: u32,
    /// Table name, when the definition was joined with its name record
    pub name: Option<String>,
    pub driver_version: u16,
    pub record_length: u16,
    /// Top-level fields; group members are nested inside their group
    pub fields: Vec<FieldDescriptor>,
    pub memos: Vec<MemoDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
}

impl TableDefinition {
    /// Parse the concatenated definition blocks of `table`
    pub fn parse(table: u32, data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let driver_version = rx.read_u16::<LittleEndian>()?;
        let record_length = rx.read_u16::<LittleEndian>()?;
        let field_count = rx.read_u16::<LittleEndian>()?;
        let memo_count = rx.read_u16::<LittleEndian>()?;
        let index_count = rx.read_u16::<LittleEndian>()?;

        let mut flat = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            flat.push(FieldDescriptor::parse(&mut rx)?);
        }

        let mut memos = Vec::with_capacity(memo_count as usize);
        for index in 0..memo_count {
            memos.push(MemoDescriptor::parse(&mut rx, u32::from(index))?);
        }

        let mut indexes = Vec::with_capacity(index_count as usize);
        for _ in 0..index_count {
            indexes.push(IndexDescriptor::parse(&mut rx)?);
        }

        let fields = nest_fields(&mut flat.into_iter().peekable(), 0, None);
        tracing::debug!(
            table,
            record_length,
            fields = fields.len(),
            memos = memos.len(),
            indexes = indexes.len(),
            "parsed table definition"
        );

        Ok(TableDefinition {
            table,
            name: None,
            driver_version,
            record_length,
            fields,
            memos,
            indexes,
        })
    }

    /// Parse from `(block number, bytes)` pairs in any order
    pub fn from_blocks(table: u32, mut blocks: Vec<(u16, Vec<u8>)>) -> TpsResult<Self> {
        blocks.sort_by_key(|(block, _)| *block);
        let data: Vec<u8> = blocks.into_iter().flat_map(|(_, bytes)| bytes).collect();
        Self::parse(table, &data)
    }

    /// Name used in diagnostics
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("table {}", name),
            None => format!("table {}", self.table),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn memo(&self, index: u32) -> Option<&MemoDescriptor> {
        self.memos.iter().find(|m| m.index == index)
    }

    pub fn memo_by_name(&self, name: &str) -> Option<&MemoDescriptor> {
        self.memos.iter().find(|m| m.name == name)
    }
}

/// Move group members under their group.
///
/// A member is any field following the group whose offset lies inside the
/// group's first element. Offsets become relative to the enclosing group.
fn nest_fields<I>(flat: &mut Peekable<I>, base: u16, end: Option<u16>) -> Vec<FieldDescriptor>
where
    I: Iterator<Item = FieldDescriptor>,
{
    let mut fields = Vec::new();
    while let Some(next) = flat.peek() {
        if let Some(end) = end {
            if next.offset < base || next.offset >= end {
                break;
            }
        }
        let Some(mut field) = flat.next() else { break };
        if field.field_type == FieldType::Group {
            let start = field.offset;
            let first_end = start.saturating_add(field.element_length());
            field.members = nest_fields(flat, start, Some(first_end));
        }
        field.offset -= base;
        fields.push(field);
    }
    fields
}
