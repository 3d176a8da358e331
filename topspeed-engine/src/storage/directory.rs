//! Page directory traversal
//!
//! The header names a root page. Pages above level 0 are directories: lists of
//! child pages, each tagged with the largest record key found below it. Leaf
//! pages hold records. Walking the tree depth first yields leaves in
//! ascending key order, and the per-entry maximum keys let a walk restricted
//! to one key prefix skip every subtree that cannot contain it.

use byteorder::LittleEndian;
use std::io::{Read, Seek};

use super::page::{Page, PageSource};
use super::reader::ByteReader;
use super::record::{parse_records, RawRecord};
use crate::error::{TpsError, TpsResult};
use crate::policy::Policy;

/// One child reference inside a directory page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Page reference of the child
    pub reference: u32,
    /// On-disk length of the child page
    pub length: u16,
    /// Largest record key in the child's subtree
    pub max_key: Vec<u8>,
}

/// Parse the entries of a directory page
pub fn parse_directory(page: &Page) -> TpsResult<Vec<DirectoryEntry>> {
    let mut rx = ByteReader::new(&page.payload);
    let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(page.record_count() as usize);

    for _ in 0..page.record_count() {
        let reference = rx.read_u32::<LittleEndian>()?;
        let length = rx.read_u16::<LittleEndian>()?;
        let key_len = rx.read_u8()? as usize;
        let max_key = rx.read_bytes(key_len)?.to_vec();

        if let Some(previous) = entries.last() {
            if previous.max_key > max_key {
                return Err(TpsError::FormatMismatch(format!(
                    "directory page at 0x{:X} lists keys out of order",
                    page.offset
                )));
            }
        }
        entries.push(DirectoryEntry {
            reference,
            length,
            max_key,
        });
    }

    Ok(entries)
}

/// Restriction of a walk to keys that start with a given prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    prefix: Vec<u8>,
}

impl KeyRange {
    /// Every key
    pub fn all() -> Self {
        KeyRange { prefix: Vec::new() }
    }

    /// Keys starting with `prefix`
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        KeyRange {
            prefix: prefix.into(),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// A subtree whose largest key is `max_key` holds nothing in range
    pub fn is_below(&self, max_key: &[u8]) -> bool {
        max_key < self.prefix.as_slice()
    }

    /// Every key after `max_key` is past the range
    pub fn is_beyond(&self, max_key: &[u8]) -> bool {
        !max_key.starts_with(&self.prefix) && max_key > self.prefix.as_slice()
    }
}

/// A leaf page with its records
#[derive(Debug, Clone)]
pub struct Leaf {
    /// File offset of the page
    pub offset: u64,
    /// Records in key order
    pub records: Vec<RawRecord>,
}

#[derive(Debug)]
struct Frame {
    entries: Vec<DirectoryEntry>,
    next: usize,
    /// Level of the page the entries came from; children must sit lower
    level: u16,
    /// The root pseudo-frame has no meaningful maximum key
    prune: bool,
}

/// Resumable depth-first walk over the page tree.
///
/// The walk holds no reference to the byte source; each step borrows it.
/// This lets several walks share one source as long as they take turns.
#[derive(Debug)]
pub struct Walk {
    range: KeyRange,
    stack: Vec<Frame>,
    done: bool,
}

impl Walk {
    /// Start a walk at the root page
    pub fn new(root_reference: u32, root_length: u16, range: KeyRange) -> Self {
        let root = DirectoryEntry {
            reference: root_reference,
            length: root_length,
            max_key: Vec::new(),
        };
        Walk {
            range,
            stack: vec![Frame {
                entries: vec![root],
                next: 0,
                level: u16::MAX,
                prune: false,
            }],
            done: false,
        }
    }

    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    /// Advance to the next leaf page in key order
    pub fn next_leaf<R: Read + Seek>(
        &mut self,
        source: &mut PageSource<R>,
        policy: Policy,
    ) -> Option<TpsResult<Leaf>> {
        loop {
            if self.done {
                return None;
            }
            let Some(frame) = self.stack.last_mut() else {
                self.done = true;
                return None;
            };
            if frame.next >= frame.entries.len() {
                self.stack.pop();
                continue;
            }

            let entry = frame.entries[frame.next].clone();
            frame.next += 1;
            let parent_level = frame.level;

            if frame.prune {
                if self.range.is_below(&entry.max_key) {
                    continue;
                }
                if self.range.is_beyond(&entry.max_key) {
                    // Later siblings at every level only hold larger keys
                    for frame in &mut self.stack {
                        frame.next = frame.entries.len();
                    }
                }
            }

            match self.visit(source, &entry, parent_level) {
                Ok(Some(leaf)) => return Some(Ok(leaf)),
                Ok(None) => continue,
                Err(err) => {
                    if let Some(err) =
                        policy.absorb(err, format_args!("page 0x{:X}", entry.reference))
                    {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    fn visit<R: Read + Seek>(
        &mut self,
        source: &mut PageSource<R>,
        entry: &DirectoryEntry,
        parent_level: u16,
    ) -> TpsResult<Option<Leaf>> {
        let page = source.read_page(entry.reference, entry.length)?;
        if page.header.level as u16 >= parent_level {
            return Err(TpsError::FormatMismatch(format!(
                "page at 0x{:X} has level {} under a level {} directory",
                page.offset, page.header.level, parent_level
            )));
        }

        if page.is_leaf() {
            let records = parse_records(&page.payload, page.record_count())?;
            return Ok(Some(Leaf {
                offset: page.offset,
                records,
            }));
        }

        let entries = parse_directory(&page)?;
        self.stack.push(Frame {
            entries,
            next: 0,
            level: page.header.level as u16,
            prune: true,
        });
        Ok(None)
    }
}
