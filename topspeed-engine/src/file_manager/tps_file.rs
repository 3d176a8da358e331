//! Open TPS file
//!
//! [`TpsFile`] owns the byte source and exposes every enumeration as a lazy
//! iterator. Iterators borrow the file mutably, so only one can be active at
//! a time; re-enumerating reads the pages again.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use super::cursor::{MemoCursor, RecordCursor};
use super::rows::{Rows, Table};
use crate::error::{TpsError, TpsResult};
use crate::policy::Policy;
use crate::records::header::{
    table_prefix, DefinitionHeader, DATA_TAG, DEFINITION_TAG, MEMO_TAG, METADATA_TAG,
    TABLE_NAME_TAG,
};
use crate::records::{
    DataRecord, IndexRecord, MemoFragment, MemoHeader, MemoRecord, MetadataRecord,
    TableDefinition, TableNameRecord,
};
use crate::storage::crypto::Key;
use crate::storage::directory::KeyRange;
use crate::storage::header::FileHeader;
use crate::storage::page::PageSource;
use crate::storage::record::RawRecord;
use crate::types::Value;

/// A TPS file opened for reading
pub struct TpsFile<R> {
    source: PageSource<R>,
}

impl TpsFile<BufReader<File>> {
    /// Open a file on disk, with a password if it is encrypted
    pub fn open_path(path: impl AsRef<Path>, password: Option<&str>) -> TpsResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TpsError::InvalidArgument(format!("{} does not exist", path.display()))
            } else {
                TpsError::Io(e)
            }
        })?;
        tracing::debug!(path = %path.display(), "opening TPS file");
        let reader = BufReader::new(file);
        match password {
            Some(password) => Self::open_with_password(reader, password),
            None => Self::open(reader),
        }
    }
}

impl<R: Read + Seek> TpsFile<R> {
    /// Open an unencrypted source
    pub fn open(source: R) -> TpsResult<Self> {
        Ok(TpsFile {
            source: PageSource::new(source, None)?,
        })
    }

    /// Open a source that may be encrypted.
    ///
    /// A wrong password is not detected here; the first page read fails with
    /// a format mismatch instead.
    pub fn open_with_password(source: R, password: &str) -> TpsResult<Self> {
        let key = Key::from_password(password)?;
        Ok(TpsFile {
            source: PageSource::new(source, Some(key))?,
        })
    }

    pub fn header(&self) -> &FileHeader {
        self.source.header()
    }

    /// Give the byte source back
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn cursor(&self, range: KeyRange) -> RecordCursor {
        RecordCursor::new(&self.source, range)
    }

    fn records<T, F>(&mut self, range: KeyRange, policy: Policy, decode: F) -> Records<'_, R, F>
    where
        F: FnMut(&RawRecord) -> TpsResult<T>,
    {
        Records {
            cursor: self.cursor(range),
            source: &mut self.source,
            policy,
            decode,
            fused: false,
        }
    }

    /// All table name records
    pub fn table_names(
        &mut self,
        policy: Policy,
    ) -> impl Iterator<Item = TpsResult<TableNameRecord>> + '_ {
        self.records(KeyRange::prefix(vec![TABLE_NAME_TAG]), policy, TableNameRecord::decode)
    }

    /// Every table definition in the file, in table number order
    pub fn table_definitions(
        &mut self,
        policy: Policy,
    ) -> impl Iterator<Item = TpsResult<TableDefinition>> + '_ {
        Definitions {
            cursor: self.cursor(KeyRange::all()),
            source: &mut self.source,
            policy,
            current: None,
            fused: false,
        }
    }

    /// The definition of one table, or `None` if the table has none
    pub fn table_definition(
        &mut self,
        table: u32,
        policy: Policy,
    ) -> TpsResult<Option<TableDefinition>> {
        let range = KeyRange::prefix(table_prefix(table, DEFINITION_TAG));
        let blocks = self
            .records(range, policy, |raw| {
                definition_block(raw).map(|(header, bytes)| (header.block, bytes))
            })
            .collect::<TpsResult<Vec<_>>>()?;
        if blocks.is_empty() {
            return Ok(None);
        }
        match TableDefinition::from_blocks(table, blocks) {
            Ok(definition) => Ok(Some(definition)),
            Err(err) => match policy.absorb(err, format_args!("definition of table {}", table)) {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    /// Data records of a table in record number order
    pub fn data_records<'a>(
        &'a mut self,
        definition: &'a TableDefinition,
        policy: Policy,
    ) -> impl Iterator<Item = TpsResult<DataRecord>> + 'a {
        let range = KeyRange::prefix(table_prefix(definition.table, DATA_TAG));
        self.records(range, policy, move |raw| DataRecord::decode(raw, definition))
    }

    /// Reassembled memos of a table, ordered by owner then memo index
    pub fn memo_records<'a>(
        &'a mut self,
        definition: &'a TableDefinition,
        policy: Policy,
    ) -> impl Iterator<Item = TpsResult<MemoRecord>> + 'a {
        let range = KeyRange::prefix(table_prefix(definition.table, MEMO_TAG));
        MemoRecords {
            memos: MemoCursor::new(self.cursor(range)),
            source: &mut self.source,
            definition,
            policy,
            fused: false,
        }
    }

    /// Fragments of a single memo in sequence order.
    ///
    /// Only the directory branches that can hold the memo are read.
    pub fn memo_fragments(
        &mut self,
        table: u32,
        owner: u32,
        memo_index: u32,
        policy: Policy,
    ) -> TpsResult<Vec<MemoFragment>> {
        let range = KeyRange::prefix(MemoHeader::prefix(table, owner, memo_index));
        let mut fragments = self
            .records(range, policy, MemoFragment::decode)
            .collect::<TpsResult<Vec<_>>>()?;
        fragments.sort_by_key(|f| f.header.sequence);
        Ok(fragments)
    }

    /// Fetch and decode one memo, `None` when the record has no such memo
    pub fn memo(
        &mut self,
        definition: &TableDefinition,
        owner: u32,
        memo_index: u32,
        policy: Policy,
    ) -> TpsResult<Option<Value>> {
        if definition.memo(memo_index).is_none() {
            return Err(TpsError::InvalidArgument(format!(
                "{} has no memo with index {}",
                definition.label(),
                memo_index
            )));
        }
        let fragments = self.memo_fragments(definition.table, owner, memo_index, policy)?;
        if fragments.is_empty() {
            return Ok(None);
        }
        match MemoRecord::assemble(definition, fragments) {
            Ok(memo) => Ok(Some(memo.value)),
            Err(err) => match policy
                .absorb(err, format_args!("memo {} of record {}", memo_index, owner))
            {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    /// Metadata records of a table
    pub fn metadata_records(
        &mut self,
        table: u32,
        policy: Policy,
    ) -> impl Iterator<Item = TpsResult<MetadataRecord>> + '_ {
        let range = KeyRange::prefix(table_prefix(table, METADATA_TAG));
        self.records(range, policy, MetadataRecord::decode)
    }

    /// Entries of one index in key order
    pub fn index_records(
        &mut self,
        table: u32,
        index: u8,
        policy: Policy,
    ) -> TpsResult<impl Iterator<Item = TpsResult<IndexRecord>> + '_> {
        if index >= DATA_TAG {
            return Err(TpsError::InvalidArgument(format!(
                "index number must be below 0x{:02X}, got 0x{:02X}",
                DATA_TAG, index
            )));
        }
        let range = KeyRange::prefix(table_prefix(table, index));
        Ok(self.records(range, policy, IndexRecord::decode))
    }

    /// Table names joined with their definitions, in name order
    pub fn tables(&mut self, policy: Policy) -> TpsResult<Vec<Table>> {
        let names = self.table_names(policy).collect::<TpsResult<Vec<_>>>()?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            match self.table_definition(name.table, policy)? {
                Some(mut definition) => {
                    definition.name = Some(name.name.clone());
                    tables.push(Table {
                        number: name.table,
                        name: name.name,
                        definition,
                    });
                }
                None => {
                    tracing::debug!(table = name.table, name = %name.name, "table has no definition")
                }
            }
        }
        Ok(tables)
    }

    /// Look a table up by name, ignoring ASCII case
    pub fn table(&mut self, name: &str, policy: Policy) -> TpsResult<Table> {
        self.tables(policy)?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TpsError::InvalidArgument(format!("no table named '{}'", name)))
    }

    /// The lowest numbered table with a definition
    pub fn first_table(&mut self, policy: Policy) -> TpsResult<Option<Table>> {
        Ok(self.tables(policy)?.into_iter().min_by_key(|t| t.number))
    }

    /// Rows of a table: data fields joined with their memos
    pub fn rows<'a>(&'a mut self, table: &'a Table, policy: Policy) -> Rows<'a, R> {
        let definition = &table.definition;
        let data = self.cursor(KeyRange::prefix(table_prefix(definition.table, DATA_TAG)));
        let memos = self.cursor(KeyRange::prefix(table_prefix(definition.table, MEMO_TAG)));
        Rows::new(&mut self.source, definition, data, MemoCursor::new(memos), policy)
    }
}

fn definition_block(raw: &RawRecord) -> TpsResult<(DefinitionHeader, Vec<u8>)> {
    let header = DefinitionHeader::from_bytes(raw.header())?;
    Ok((header, raw.payload().to_vec()))
}

/// Records in a key range, decoded one by one
struct Records<'a, R, F> {
    source: &'a mut PageSource<R>,
    cursor: RecordCursor,
    policy: Policy,
    decode: F,
    fused: bool,
}

impl<'a, R, T, F> Iterator for Records<'a, R, F>
where
    R: Read + Seek,
    F: FnMut(&RawRecord) -> TpsResult<T>,
{
    type Item = TpsResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        loop {
            let raw = match self.cursor.next(self.source, self.policy)? {
                Ok(raw) => raw,
                Err(err) => {
                    self.fused = true;
                    return Some(Err(err));
                }
            };
            match (self.decode)(&raw) {
                Ok(item) => return Some(Ok(item)),
                Err(err) => {
                    let unit = raw.header();
                    if let Some(err) = self.policy.absorb(err, format_args!("record {:02X?}", unit)) {
                        self.fused = true;
                        return Some(Err(err));
                    }
                }
            }
        }
    }
}

/// Definition blocks gathered table by table during a full scan
struct Definitions<'a, R> {
    source: &'a mut PageSource<R>,
    cursor: RecordCursor,
    policy: Policy,
    current: Option<(u32, Vec<(u16, Vec<u8>)>)>,
    fused: bool,
}

impl<'a, R: Read + Seek> Definitions<'a, R> {
    fn is_definition(raw: &RawRecord) -> bool {
        let key = raw.header();
        key.len() > 4 && key[0] != TABLE_NAME_TAG && key[4] == DEFINITION_TAG
    }

    /// Parse a finished table; `None` when a tolerated failure dropped it
    fn finish(&mut self, table: u32, blocks: Vec<(u16, Vec<u8>)>) -> Option<TpsResult<TableDefinition>> {
        match TableDefinition::from_blocks(table, blocks) {
            Ok(definition) => Some(Ok(definition)),
            Err(err) => {
                let err = self
                    .policy
                    .absorb(err, format_args!("definition of table {}", table))?;
                self.fused = true;
                Some(Err(err))
            }
        }
    }
}

impl<'a, R: Read + Seek> Iterator for Definitions<'a, R> {
    type Item = TpsResult<TableDefinition>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.fused {
            let raw = match self.cursor.next(self.source, self.policy) {
                Some(Ok(raw)) => raw,
                Some(Err(err)) => {
                    self.fused = true;
                    return Some(Err(err));
                }
                None => {
                    self.fused = true;
                    let (table, blocks) = self.current.take()?;
                    return self.finish(table, blocks);
                }
            };
            if !Self::is_definition(&raw) {
                continue;
            }
            let (header, bytes) = match definition_block(&raw) {
                Ok(block) => block,
                Err(err) => match self.policy.absorb(err, format_args!("definition block")) {
                    Some(err) => {
                        self.fused = true;
                        return Some(Err(err));
                    }
                    None => continue,
                },
            };
            let (table, block) = (header.table, header.block);

            match self.current.take() {
                Some((current, mut blocks)) if current == table => {
                    blocks.push((block, bytes));
                    self.current = Some((current, blocks));
                }
                Some((current, blocks)) => {
                    self.current = Some((table, vec![(block, bytes)]));
                    if let Some(item) = self.finish(current, blocks) {
                        return Some(item);
                    }
                }
                None => self.current = Some((table, vec![(block, bytes)])),
            }
        }
        None
    }
}

/// Memos of one table, assembled from adjacent fragments
struct MemoRecords<'a, R> {
    source: &'a mut PageSource<R>,
    memos: MemoCursor,
    definition: &'a TableDefinition,
    policy: Policy,
    fused: bool,
}

impl<'a, R: Read + Seek> Iterator for MemoRecords<'a, R> {
    type Item = TpsResult<MemoRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.fused {
            let group = match self.memos.next_group(self.source, self.policy)? {
                Ok(group) => group,
                Err(err) => {
                    self.fused = true;
                    return Some(Err(err));
                }
            };
            let (owner, index) = (group[0].header.owner, group[0].header.memo_index);
            match MemoRecord::assemble(self.definition, group) {
                Ok(memo) => return Some(Ok(memo)),
                Err(err) => {
                    if let Some(err) = self
                        .policy
                        .absorb(err, format_args!("memo {} of record {}", index, owner))
                    {
                        self.fused = true;
                        return Some(Err(err));
                    }
                }
            }
        }
        None
    }
}
