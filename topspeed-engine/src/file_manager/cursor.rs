//! Record cursors
//!
//! A cursor tracks a position in the page tree without owning the byte
//! source. Each step borrows the source, so several cursors over one file
//! can advance in turn (the row assembler keeps one for data records and one
//! for memo fragments).

use std::collections::VecDeque;
use std::io::{Read, Seek};

use crate::error::TpsResult;
use crate::policy::Policy;
use crate::records::MemoFragment;
use crate::storage::directory::{KeyRange, Walk};
use crate::storage::page::PageSource;
use crate::storage::record::RawRecord;

/// Raw records whose key starts with a given prefix, in key order
#[derive(Debug)]
pub struct RecordCursor {
    walk: Walk,
    pending: VecDeque<RawRecord>,
}

impl RecordCursor {
    /// Create a cursor positioned before the first record of `range`
    pub fn new<R: Read + Seek>(source: &PageSource<R>, range: KeyRange) -> Self {
        let header = source.header();
        RecordCursor {
            walk: Walk::new(header.root_reference, header.root_length, range),
            pending: VecDeque::new(),
        }
    }

    /// Step to the next record in range
    pub fn next<R: Read + Seek>(
        &mut self,
        source: &mut PageSource<R>,
        policy: Policy,
    ) -> Option<TpsResult<RawRecord>> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            match self.walk.next_leaf(source, policy)? {
                Ok(leaf) => {
                    let range = self.walk.range();
                    self.pending
                        .extend(leaf.records.into_iter().filter(|r| range.contains(r.header())));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Memo fragments grouped into whole memos
#[derive(Debug)]
pub struct MemoCursor {
    records: RecordCursor,
    carry: Option<MemoFragment>,
    done: bool,
}

impl MemoCursor {
    pub fn new(records: RecordCursor) -> Self {
        MemoCursor {
            records,
            carry: None,
            done: false,
        }
    }

    /// Collect the fragments of the next memo.
    ///
    /// Fragments of one memo are adjacent because their keys share everything
    /// but the trailing sequence number.
    pub fn next_group<R: Read + Seek>(
        &mut self,
        source: &mut PageSource<R>,
        policy: Policy,
    ) -> Option<TpsResult<Vec<MemoFragment>>> {
        if self.done {
            return None;
        }
        let mut group: Vec<MemoFragment> = self.carry.take().into_iter().collect();

        loop {
            let raw = match self.records.next(source, policy) {
                Some(Ok(raw)) => raw,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    break;
                }
            };
            let fragment = match MemoFragment::decode(&raw) {
                Ok(fragment) => fragment,
                Err(err) => match policy.absorb(err, format_args!("memo fragment")) {
                    Some(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                    None => continue,
                },
            };
            match group.first() {
                Some(first) if !first.same_memo(&fragment) => {
                    self.carry = Some(fragment);
                    break;
                }
                _ => group.push(fragment),
            }
        }

        (!group.is_empty()).then_some(Ok(group))
    }
}
