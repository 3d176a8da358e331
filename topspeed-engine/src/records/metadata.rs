//! Metadata records: per-table statistics such as record counts

use byteorder::LittleEndian;
use serde::Serialize;

use super::header::MetadataHeader;
use crate::error::TpsResult;
use crate::storage::reader::ByteReader;
use crate::storage::record::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    pub table: u32,
    pub about: u8,
    /// Number of records of the described kind
    pub count: u32,
}

impl MetadataRecord {
    pub fn decode(raw: &RawRecord) -> TpsResult<Self> {
        let header = MetadataHeader::from_bytes(raw.header())?;
        let payload = raw.payload();
        let count = ByteReader::new(&payload).read_u32::<LittleEndian>()?;
        Ok(MetadataRecord {
            table: header.table,
            about: header.about,
            count,
        })
    }

    pub fn is_about_data(&self) -> bool {
        self.about == super::header::DATA_TAG
    }
}
