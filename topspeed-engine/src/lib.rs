//! TopSpeed Engine - reader for TopSpeed (.TPS) database files
//!
//! This crate decodes the paged, optionally encrypted and compressed TPS
//! format into table definitions, records, memos and joined rows. It never
//! writes to the file.

pub mod error;
pub mod policy;
pub mod storage;
pub mod records;
pub mod types;
pub mod file_manager;

pub use error::{ErrorKind, TpsError, TpsResult};
pub use policy::Policy;
pub use file_manager::{Row, Table, TpsFile};
pub use records::{DataRecord, MemoRecord, TableDefinition};
pub use types::{Decimal, FieldType, Value};
