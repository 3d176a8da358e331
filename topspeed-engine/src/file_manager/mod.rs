//! File manager for TPS files
//!
//! Opens files and turns the page tree into tables, records, memos and rows.

pub mod cursor;
pub mod tps_file;
pub mod rows;

pub use cursor::{MemoCursor, RecordCursor};
pub use tps_file::TpsFile;
pub use rows::{Row, Rows, Table};
