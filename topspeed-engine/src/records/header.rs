//! Record headers
//!
//! Every leaf record starts with a header that doubles as its sort key. Apart
//! from table names, which are global, a header begins with the owning table
//! number (u32 BE) followed by a one-byte tag selecting the record kind:
//!
//! | tag        | kind              | remaining header bytes                |
//! |------------|-------------------|---------------------------------------|
//! | 0x00..0xF2 | index entry       | key, then record number (u32 BE)      |
//! | 0xF3       | data              | record number (u32 BE)                |
//! | 0xF6       | metadata          | "about" byte                          |
//! | 0xFA       | table definition  | block number (u16 BE)                 |
//! | 0xFC       | memo fragment     | owner, memo index (u32 BE each), sequence (u16 BE) |
//! | 0xFE       | table name        | name (tag is the very first byte)     |

use byteorder::BigEndian;

use crate::error::{TpsError, TpsResult};
use crate::storage::reader::{latin1, ByteReader};

pub const DATA_TAG: u8 = 0xF3;
pub const METADATA_TAG: u8 = 0xF6;
pub const DEFINITION_TAG: u8 = 0xFA;
pub const MEMO_TAG: u8 = 0xFC;
pub const TABLE_NAME_TAG: u8 = 0xFE;

/// Key prefix shared by all records of one kind in one table
pub fn table_prefix(table: u32, tag: u8) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(5);
    prefix.extend_from_slice(&table.to_be_bytes());
    prefix.push(tag);
    prefix
}

/// Read the common `[table][tag]` prefix and check the tag
fn read_prefix(rx: &mut ByteReader<'_>, what: &str, expected: u8) -> TpsResult<u32> {
    let table = rx.read_u32::<BigEndian>()?;
    let tag = rx.read_u8()?;
    if tag != expected {
        return Err(TpsError::tag_mismatch(what, expected, tag));
    }
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNameHeader {
    pub name: String,
}

impl TableNameHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let tag = rx.read_u8()?;
        if tag != TABLE_NAME_TAG {
            return Err(TpsError::tag_mismatch("TableName", TABLE_NAME_TAG, tag));
        }
        Ok(TableNameHeader {
            name: latin1(rx.read_rest()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    pub table: u32,
    pub record_number: u32,
}

impl DataHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let table = read_prefix(&mut rx, "Data", DATA_TAG)?;
        Ok(DataHeader {
            table,
            record_number: rx.read_u32::<BigEndian>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataHeader {
    pub table: u32,
    /// What the metadata describes: 0xF3 for data records, an index number below that
    pub about: u8,
}

impl MetadataHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let table = read_prefix(&mut rx, "Metadata", METADATA_TAG)?;
        Ok(MetadataHeader {
            table,
            about: rx.read_u8()?,
        })
    }

    pub fn is_about_data(&self) -> bool {
        self.about == DATA_TAG
    }

    /// Index number the metadata describes, if any
    pub fn about_index(&self) -> Option<u8> {
        (self.about < DATA_TAG).then_some(self.about)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionHeader {
    pub table: u32,
    pub block: u16,
}

impl DefinitionHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let table = read_prefix(&mut rx, "TableDefinition", DEFINITION_TAG)?;
        Ok(DefinitionHeader {
            table,
            block: rx.read_u16::<BigEndian>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoHeader {
    pub table: u32,
    /// Record number of the data record owning the memo
    pub owner: u32,
    /// Ordinal of the memo in the table definition
    pub memo_index: u32,
    pub sequence: u16,
}

impl MemoHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let table = read_prefix(&mut rx, "Memo", MEMO_TAG)?;
        Ok(MemoHeader {
            table,
            owner: rx.read_u32::<BigEndian>()?,
            memo_index: rx.read_u32::<BigEndian>()?,
            sequence: rx.read_u16::<BigEndian>()?,
        })
    }

    pub fn applies_to(&self, table: u32, memo_index: u32) -> bool {
        self.table == table && self.memo_index == memo_index
    }

    /// Key prefix of every fragment of one memo
    pub fn prefix(table: u32, owner: u32, memo_index: u32) -> Vec<u8> {
        let mut prefix = table_prefix(table, MEMO_TAG);
        prefix.extend_from_slice(&owner.to_be_bytes());
        prefix.extend_from_slice(&memo_index.to_be_bytes());
        prefix
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub table: u32,
    pub index: u8,
}

impl IndexHeader {
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        let table = rx.read_u32::<BigEndian>()?;
        let index = rx.read_u8()?;
        if index >= DATA_TAG {
            return Err(TpsError::FormatMismatch(format!(
                "Index header expects a tag below 0x{:02X}, found 0x{:02X}",
                DATA_TAG, index
            )));
        }
        Ok(IndexHeader { table, index })
    }
}

/// Any record header, routed by its tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    TableName(TableNameHeader),
    Data(DataHeader),
    Metadata(MetadataHeader),
    TableDefinition(DefinitionHeader),
    Memo(MemoHeader),
    Index(IndexHeader),
}

impl Header {
    pub fn parse(data: &[u8]) -> TpsResult<Self> {
        let rx = ByteReader::new(data);
        if rx.peek_u8(0)? == TABLE_NAME_TAG {
            return Ok(Header::TableName(TableNameHeader::from_bytes(data)?));
        }

        match rx.peek_u8(4)? {
            DATA_TAG => Ok(Header::Data(DataHeader::from_bytes(data)?)),
            METADATA_TAG => Ok(Header::Metadata(MetadataHeader::from_bytes(data)?)),
            DEFINITION_TAG => Ok(Header::TableDefinition(DefinitionHeader::from_bytes(data)?)),
            MEMO_TAG => Ok(Header::Memo(MemoHeader::from_bytes(data)?)),
            tag if tag < DATA_TAG => Ok(Header::Index(IndexHeader::from_bytes(data)?)),
            tag => Err(TpsError::FormatMismatch(format!(
                "unrecognized record tag 0x{:02X}",
                tag
            ))),
        }
    }

    /// Owning table; table names belong to the whole file
    pub fn table(&self) -> Option<u32> {
        match self {
            Header::TableName(_) => None,
            Header::Data(h) => Some(h.table),
            Header::Metadata(h) => Some(h.table),
            Header::TableDefinition(h) => Some(h.table),
            Header::Memo(h) => Some(h.table),
            Header::Index(h) => Some(h.table),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Header::TableName(_) => TABLE_NAME_TAG,
            Header::Data(_) => DATA_TAG,
            Header::Metadata(_) => METADATA_TAG,
            Header::TableDefinition(_) => DEFINITION_TAG,
            Header::Memo(_) => MEMO_TAG,
            Header::Index(h) => h.index,
        }
    }
}
