//! Rows and tables
//!
//! A row is a data record with the memos it owns folded in. Data records and
//! memo fragments are both keyed by big-endian record number, so the two
//! streams come out of the page tree already sorted by owner and can be
//! merge-joined in one pass.

use serde::Serialize;
use std::io::{Read, Seek};

use super::cursor::{MemoCursor, RecordCursor};
use crate::error::TpsResult;
use crate::policy::Policy;
use crate::records::{DataRecord, MemoRecord, TableDefinition};
use crate::storage::page::PageSource;
use crate::types::value::serialize_pairs;
use crate::types::Value;

/// A table with its name and schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub number: u32,
    pub name: String,
    pub definition: TableDefinition,
}

/// One logical row: data fields first, then memos
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub record_number: u32,
    #[serde(serialize_with = "serialize_pairs")]
    pub values: Vec<(String, Value)>,
}

impl Row {
    fn from_record(record: DataRecord) -> Self {
        Row {
            record_number: record.record_number,
            values: record.values,
        }
    }

    /// Attach a memo; one that shares a field's name takes the field's place
    fn attach(&mut self, memo: MemoRecord) {
        match self.values.iter_mut().find(|(name, _)| *name == memo.name) {
            Some((_, value)) => *value = memo.value,
            None => self.values.push((memo.name, memo.value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lazy iterator over the rows of one table
pub struct Rows<'a, R> {
    source: &'a mut PageSource<R>,
    definition: &'a TableDefinition,
    data: RecordCursor,
    memos: MemoCursor,
    /// Next memo not yet matched to a row
    lookahead: Option<MemoRecord>,
    memos_done: bool,
    policy: Policy,
    fused: bool,
}

impl<'a, R: Read + Seek> Rows<'a, R> {
    pub(crate) fn new(
        source: &'a mut PageSource<R>,
        definition: &'a TableDefinition,
        data: RecordCursor,
        memos: MemoCursor,
        policy: Policy,
    ) -> Self {
        Rows {
            source,
            definition,
            data,
            memos,
            lookahead: None,
            memos_done: false,
            policy,
            fused: false,
        }
    }

    /// Next data record that decodes, honouring the policy
    fn next_record(&mut self) -> Option<TpsResult<DataRecord>> {
        loop {
            let raw = match self.data.next(self.source, self.policy)? {
                Ok(raw) => raw,
                Err(err) => return Some(Err(err)),
            };
            match DataRecord::decode(&raw, self.definition) {
                Ok(record) => return Some(Ok(record)),
                Err(err) => {
                    let unit = raw.header();
                    if let Some(err) = self
                        .policy
                        .absorb(err, format_args!("data record {:02X?}", unit))
                    {
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    /// Make sure `lookahead` holds the next assembled memo, if any remain
    fn fill_lookahead(&mut self) -> TpsResult<()> {
        while self.lookahead.is_none() && !self.memos_done {
            let group = match self.memos.next_group(self.source, self.policy) {
                Some(group) => group?,
                None => {
                    self.memos_done = true;
                    break;
                }
            };
            let (owner, index) = (group[0].header.owner, group[0].header.memo_index);
            match MemoRecord::assemble(self.definition, group) {
                Ok(memo) => self.lookahead = Some(memo),
                Err(err) => {
                    if let Some(err) = self
                        .policy
                        .absorb(err, format_args!("memo {} of record {}", index, owner))
                    {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Attach every memo owned by the row; skip memos of missing records
    fn join_memos(&mut self, row: &mut Row) -> TpsResult<()> {
        loop {
            self.fill_lookahead()?;
            match self.lookahead.take() {
                Some(memo) if memo.owner < row.record_number => {
                    tracing::debug!(
                        owner = memo.owner,
                        index = memo.index,
                        "memo without data record"
                    );
                }
                Some(memo) if memo.owner == row.record_number => row.attach(memo),
                other => {
                    self.lookahead = other;
                    return Ok(());
                }
            }
        }
    }
}

impl<'a, R: Read + Seek> Iterator for Rows<'a, R> {
    type Item = TpsResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let record = match self.next_record()? {
            Ok(record) => record,
            Err(err) => {
                self.fused = true;
                return Some(Err(err));
            }
        };

        let mut row = Row::from_record(record);
        if let Err(err) = self.join_memos(&mut row) {
            self.fused = true;
            return Some(Err(err));
        }
        tracing::trace!(record = row.record_number, values = row.len(), "assembled row");
        Some(Ok(row))
    }
}
