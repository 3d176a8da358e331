//! Data records

use bytes::Bytes;
use serde::Serialize;

use super::header::DataHeader;
use super::table_def::TableDefinition;
use crate::error::{TpsError, TpsResult};
use crate::storage::record::RawRecord;
use crate::types::value::serialize_pairs;
use crate::types::{decode_field, Value};

/// One fixed-width row of a table with its fields decoded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    pub table: u32,
    pub record_number: u32,
    #[serde(skip)]
    pub payload: Bytes,
    /// Top-level fields in declared order
    #[serde(serialize_with = "serialize_pairs")]
    pub values: Vec<(String, Value)>,
}

impl DataRecord {
    pub fn decode(raw: &RawRecord, definition: &TableDefinition) -> TpsResult<Self> {
        let header = DataHeader::from_bytes(raw.header())?;
        if header.table != definition.table {
            return Err(TpsError::InvalidArgument(format!(
                "data record of table {} decoded with the definition of table {}",
                header.table, definition.table
            )));
        }

        let payload = raw.payload();
        let label = definition.label();
        let values = definition
            .fields
            .iter()
            .map(|field| Ok((field.name.clone(), decode_field(&payload, field, &label)?)))
            .collect::<TpsResult<Vec<_>>>()?;

        Ok(DataRecord {
            table: header.table,
            record_number: header.record_number,
            payload,
            values,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}
