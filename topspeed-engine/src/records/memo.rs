//! Memo and blob records
//!
//! Memos live outside the fixed-width data record. A memo is split into
//! fragments keyed by (table, owner record, memo index, sequence number);
//! joining the fragments in sequence order gives the stored bytes. Text memos
//! run up to the first NUL. Blobs start with their length as u32 LE.

use byteorder::LittleEndian;
use bytes::Bytes;
use serde::Serialize;

use super::header::MemoHeader;
use super::table_def::TableDefinition;
use crate::error::{TpsError, TpsResult};
use crate::storage::reader::{apply_rule, ByteReader, StringRule};
use crate::storage::record::RawRecord;
use crate::types::Value;

/// One stored piece of a memo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoFragment {
    pub header: MemoHeader,
    pub payload: Bytes,
}

impl MemoFragment {
    pub fn decode(raw: &RawRecord) -> TpsResult<Self> {
        Ok(MemoFragment {
            header: MemoHeader::from_bytes(raw.header())?,
            payload: raw.payload(),
        })
    }

    /// Fragments with the same key belong to the same memo
    pub fn same_memo(&self, other: &MemoFragment) -> bool {
        self.header.table == other.header.table
            && self.header.owner == other.header.owner
            && self.header.memo_index == other.header.memo_index
    }
}

/// A memo reassembled from its fragments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoRecord {
    pub table: u32,
    pub owner: u32,
    pub index: u32,
    pub name: String,
    pub value: Value,
}

impl MemoRecord {
    /// Join the fragments of one memo and decode them per the descriptor
    pub fn assemble(
        definition: &TableDefinition,
        mut fragments: Vec<MemoFragment>,
    ) -> TpsResult<Self> {
        let first = fragments
            .first()
            .ok_or_else(|| TpsError::InvalidArgument("memo without fragments".into()))?
            .header
            .clone();
        if let Some(stray) = fragments.iter().find(|f| !f.same_memo(&fragments[0])) {
            return Err(TpsError::InvalidArgument(format!(
                "fragment of record {} memo {} mixed into record {} memo {}",
                stray.header.owner, stray.header.memo_index, first.owner, first.memo_index
            )));
        }
        if !first.applies_to(definition.table, first.memo_index) {
            return Err(TpsError::InvalidArgument(format!(
                "memo of table {} assembled with the definition of table {}",
                first.table, definition.table
            )));
        }
        let descriptor = definition.memo(first.memo_index).ok_or_else(|| {
            TpsError::InvalidArgument(format!(
                "{} has no memo with index {}",
                definition.label(),
                first.memo_index
            ))
        })?;

        fragments.sort_by_key(|f| f.header.sequence);
        let total = fragments.iter().map(|f| f.payload.len()).sum();
        let mut data = Vec::with_capacity(total);
        for fragment in &fragments {
            data.extend_from_slice(&fragment.payload);
        }

        let label = definition.label();
        let value = if descriptor.is_blob() {
            Value::Blob(unpack_blob(&data).map_err(|reason| {
                TpsError::decoding(&label, &descriptor.name, reason)
            })?)
        } else {
            Value::Memo(
                apply_rule(&data, StringRule::NullTerminated)
                    .map_err(|err| TpsError::decoding(&label, &descriptor.name, err.to_string()))?,
            )
        };

        tracing::trace!(
            table = first.table,
            owner = first.owner,
            index = first.memo_index,
            fragments = fragments.len(),
            bytes = total,
            "assembled memo"
        );

        Ok(MemoRecord {
            table: first.table,
            owner: first.owner,
            index: first.memo_index,
            name: descriptor.name.clone(),
            value,
        })
    }
}

fn unpack_blob(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut rx = ByteReader::new(data);
    let len = rx
        .read_u32::<LittleEndian>()
        .map_err(|_| format!("blob of {} bytes has no length prefix", data.len()))?
        as usize;
    rx.read_bytes(len).map(<[u8]>::to_vec).map_err(|_| {
        format!(
            "blob declares {} bytes but only {} are stored",
            len,
            rx.remaining()
        )
    })
}
