//! File header - the fixed 0x200-byte block at the start of every TPS file
//!
//! Layout:
//! - Offset 0x00: zero marker (u32 LE, always 0)
//! - Offset 0x04: header size (u16 LE, always 0x200)
//! - Offset 0x06: file length (u32 LE), repeated at 0x0A
//! - Offset 0x0E: signature "tOpS"
//! - Offset 0x12: flags (u16 LE)
//! - Offset 0x14: last issued record number (u32 BE)
//! - Offset 0x18: change counter (u32 LE)
//! - Offset 0x1C: root page reference (u32 LE)
//! - Offset 0x20: root page length (u16 LE)

use byteorder::{BigEndian, LittleEndian};

use super::reader::ByteReader;
use crate::error::{TpsError, TpsResult};

bitflags::bitflags! {
    /// File-level flags stored in the header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u16 {
        /// Pages are scrambled with the owner password
        const ENCRYPTED = 0x0001;
    }
}

/// Size of the header block; page references are relative to its end
pub const HEADER_SIZE: usize = 0x200;

/// Signature at offset 0x0E
pub const SIGNATURE: &[u8; 4] = b"tOpS";

/// Translate a page reference into an absolute file offset
pub fn page_offset(reference: u32) -> u64 {
    ((reference as u64) << 8) + HEADER_SIZE as u64
}

/// Parsed file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Total file length as recorded by the writer
    pub file_length: u32,
    /// File flags
    pub flags: FileFlags,
    /// Highest record number handed out so far
    pub last_issued_record: u32,
    /// Number of committed changes
    pub changes: u32,
    /// Reference of the root directory page
    pub root_reference: u32,
    /// On-disk length of the root directory page
    pub root_length: u16,
}

impl FileHeader {
    /// Parse the header block
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);

        let marker = rx.read_u32::<LittleEndian>()?;
        if marker != 0 {
            return Err(TpsError::FormatMismatch(format!(
                "file starts with 0x{:08X} instead of zero; not a TopSpeed file",
                marker
            )));
        }
        let header_size = rx.read_u16::<LittleEndian>()?;
        if header_size as usize != HEADER_SIZE {
            return Err(TpsError::FormatMismatch(format!(
                "header size is 0x{:X}, expected 0x{:X}",
                header_size, HEADER_SIZE
            )));
        }
        let file_length = rx.read_u32::<LittleEndian>()?;
        let _file_length_copy = rx.read_u32::<LittleEndian>()?;
        let signature = rx.read_bytes(4)?;
        if signature != SIGNATURE {
            return Err(TpsError::FormatMismatch(format!(
                "signature {:02X?} is not 'tOpS'",
                signature
            )));
        }
        let flags = FileFlags::from_bits_truncate(rx.read_u16::<LittleEndian>()?);
        let last_issued_record = rx.read_u32::<BigEndian>()?;
        let changes = rx.read_u32::<LittleEndian>()?;
        let root_reference = rx.read_u32::<LittleEndian>()?;
        let root_length = rx.read_u16::<LittleEndian>()?;

        Ok(FileHeader {
            file_length,
            flags,
            last_issued_record,
            changes,
            root_reference,
            root_length,
        })
    }

    /// Check whether pages must be decrypted before use
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(FileFlags::ENCRYPTED)
    }

    /// Absolute offset of the root directory page
    pub fn root_offset(&self) -> u64 {
        page_offset(self.root_reference)
    }
}
