//! Record decoders
//!
//! Leaf records are interpreted according to their header tag:
//! - Table names and table definitions
//! - Data records
//! - Memo and blob fragments
//! - Metadata and index entries

pub mod header;
pub mod table_def;
pub mod table_name;
pub mod data;
pub mod memo;
pub mod metadata;
pub mod index;

pub use header::{Header, MemoHeader};
pub use table_def::{FieldDescriptor, IndexDescriptor, MemoDescriptor, TableDefinition};
pub use table_name::TableNameRecord;
pub use data::DataRecord;
pub use memo::{MemoFragment, MemoRecord};
pub use metadata::MetadataRecord;
pub use index::IndexRecord;
