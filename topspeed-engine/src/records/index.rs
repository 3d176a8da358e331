//! Index records
//!
//! An index entry is `[table][index number][key bytes][record number]`. The
//! record number (u32 BE) is always the last four bytes of the entry.

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use serde::Serialize;

use super::header::IndexHeader;
use crate::error::{TpsError, TpsResult};
use crate::storage::record::RawRecord;

const PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    pub table: u32,
    pub index: u8,
    /// Raw key bytes as stored, in index order
    #[serde(serialize_with = "serialize_hex")]
    pub key: Bytes,
    pub record_number: u32,
}

impl IndexRecord {
    pub fn decode(raw: &RawRecord) -> TpsResult<Self> {
        let header = IndexHeader::from_bytes(raw.header())?;
        let data = Bytes::copy_from_slice(raw.data());
        if data.len() < PREFIX_LEN + 4 {
            return Err(TpsError::OutOfRange {
                position: PREFIX_LEN,
                wanted: 4,
                length: data.len(),
            });
        }
        let split = data.len() - 4;
        Ok(IndexRecord {
            table: header.table,
            index: header.index,
            key: data.slice(PREFIX_LEN..split),
            record_number: BigEndian::read_u32(&data[split..]),
        })
    }
}

fn serialize_hex<S: serde::Serializer>(key: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = key.iter().map(|b| format!("{:02X}", b)).collect();
    serializer.serialize_str(&hex)
}
