//! Error taxonomy for the TopSpeed decoder
//!
//! Every failure the engine can report falls into one of a small number of
//! categories. Callers that only care about the category (for example to tell
//! a wrong password apart from a truncated file) can branch on [`ErrorKind`].

use thiserror::Error;

/// Broad category of a decoding failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A header tag, signature or page address did not match.
    /// Usually a wrong password, a corrupt page or not a TPS file at all.
    FormatMismatch,
    /// A read would have gone past the end of its span
    OutOfRange,
    /// Run-length expansion did not produce the declared length
    RunLength,
    /// A field value could not be decoded against its descriptor
    Decoding,
    /// The caller passed something unusable
    InvalidArgument,
    /// The underlying byte source failed
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::FormatMismatch => "format mismatch",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::RunLength => "run-length expansion error",
            ErrorKind::Decoding => "decoding error",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Io => "I/O error",
        })
    }
}

/// Main error type for the TopSpeed engine
#[derive(Error, Debug)]
pub enum TpsError {
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Read of {wanted} bytes at position {position} exceeds length {length}")]
    OutOfRange {
        position: usize,
        wanted: usize,
        length: usize,
    },

    #[error("Run-length expansion failed: {0}")]
    RunLength(String),

    #[error("Cannot decode field '{field}' of {table}: {reason}")]
    Decoding {
        table: String,
        field: String,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TpsError {
    /// Get the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TpsError::FormatMismatch(_) => ErrorKind::FormatMismatch,
            TpsError::OutOfRange { .. } => ErrorKind::OutOfRange,
            TpsError::RunLength(_) => ErrorKind::RunLength,
            TpsError::Decoding { .. } => ErrorKind::Decoding,
            TpsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TpsError::Io(_) => ErrorKind::Io,
        }
    }

    /// Shorthand for a tag assertion failure
    pub(crate) fn tag_mismatch(what: &str, expected: u8, found: u8) -> Self {
        TpsError::FormatMismatch(format!(
            "{} header expects tag 0x{:02X}, found 0x{:02X}",
            what, expected, found
        ))
    }

    /// Shorthand for a field decoding failure
    pub(crate) fn decoding(table: &str, field: &str, reason: impl Into<String>) -> Self {
        TpsError::Decoding {
            table: table.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for TopSpeed operations
pub type TpsResult<T> = Result<T, TpsError>;
