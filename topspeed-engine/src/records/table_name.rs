//! Table name records: map a table name to its number

use byteorder::BigEndian;
use serde::Serialize;

use super::header::TableNameHeader;
use crate::error::TpsResult;
use crate::storage::reader::ByteReader;
use crate::storage::record::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNameRecord {
    pub name: String,
    pub table: u32,
}

impl TableNameRecord {
    pub fn decode(raw: &RawRecord) -> TpsResult<Self> {
        let header = TableNameHeader::from_bytes(raw.header())?;
        let payload = raw.payload();
        let table = ByteReader::new(&payload).read_u32::<BigEndian>()?;
        Ok(TableNameRecord {
            name: header.name,
            table,
        })
    }
}
