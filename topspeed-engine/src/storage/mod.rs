//! Storage layer for the TPS file format
//!
//! This module handles the low-level binary format of TPS files:
//! - Positional byte reading
//! - Page decryption and run-length expansion
//! - The file header
//! - Page directory traversal
//! - Prefix-compressed leaf records

pub mod reader;
pub mod crypto;
pub mod rle;
pub mod header;
pub mod page;
pub mod record;
pub mod directory;

pub use reader::{ByteReader, StringRule};
pub use crypto::Key;
pub use header::{FileFlags, FileHeader};
pub use page::{Page, PageHeader, PageSource};
pub use record::RawRecord;
pub use directory::{DirectoryEntry, KeyRange, Leaf, Walk};
