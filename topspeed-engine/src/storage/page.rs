//! Page I/O and page structure definitions for TPS files
//!
//! Pages start on 0x100 boundaries after the file header. Each page begins
//! with a 13-byte header; the rest is the payload, which is run-length
//! compressed whenever the on-disk size differs from the uncompressed size.
//! In encrypted files the page (rounded up to whole cipher blocks) has to be
//! decrypted before even the header can be read.

use byteorder::LittleEndian;
use std::io::{Read, Seek, SeekFrom};

use super::crypto::{block_aligned, Key};
use super::header::{page_offset, FileHeader, HEADER_SIZE};
use super::reader::ByteReader;
use super::rle;
use crate::error::{TpsError, TpsResult};

/// Common page header structure (first bytes of each page)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    /// Absolute file offset the page claims to live at
    pub address: u32,
    /// On-disk size including this header
    pub size: u16,
    /// Size after run-length expansion, including this header
    pub uncompressed_size: u16,
    /// Size after expansion without the header, as recorded by the writer
    pub uncompressed_payload_size: u16,
    /// Number of directory entries or records in the payload
    pub record_count: u16,
    /// Distance from the leaves; 0 for leaf pages
    pub level: u8,
}

impl PageHeader {
    /// Size of the page header in bytes
    pub const SIZE: usize = 13;

    /// Read a page header from bytes
    pub fn from_bytes(data: &[u8]) -> TpsResult<Self> {
        let mut rx = ByteReader::new(data);
        Ok(PageHeader {
            address: rx.read_u32::<LittleEndian>()?,
            size: rx.read_u16::<LittleEndian>()?,
            uncompressed_size: rx.read_u16::<LittleEndian>()?,
            uncompressed_payload_size: rx.read_u16::<LittleEndian>()?,
            record_count: rx.read_u16::<LittleEndian>()?,
            level: rx.read_u8()?,
        })
    }

    /// Check whether the payload is run-length compressed
    pub fn is_compressed(&self) -> bool {
        self.size != self.uncompressed_size
    }
}

/// A decoded page: header plus the expanded payload
#[derive(Clone)]
pub struct Page {
    /// Absolute file offset
    pub offset: u64,
    /// Page header
    pub header: PageHeader,
    /// Payload after decryption and expansion
    pub payload: Vec<u8>,
}

impl Page {
    /// Decode a page from its plaintext on-disk bytes
    pub fn from_bytes(offset: u64, data: &[u8]) -> TpsResult<Self> {
        let header = PageHeader::from_bytes(data)?;

        if header.address as u64 != offset {
            return Err(TpsError::FormatMismatch(format!(
                "page at 0x{:X} claims address 0x{:X}",
                offset, header.address
            )));
        }
        if header.size as usize != data.len() {
            return Err(TpsError::FormatMismatch(format!(
                "page at 0x{:X} has size {} but its directory entry says {}",
                offset,
                header.size,
                data.len()
            )));
        }
        if (header.uncompressed_size as usize) < PageHeader::SIZE {
            return Err(TpsError::FormatMismatch(format!(
                "page at 0x{:X} declares uncompressed size {}",
                offset, header.uncompressed_size
            )));
        }

        let body = &data[PageHeader::SIZE..];
        let payload = if header.is_compressed() {
            rle::expand(body, header.uncompressed_size as usize - PageHeader::SIZE)?
        } else {
            body.to_vec()
        };

        Ok(Page {
            offset,
            header,
            payload,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.header.level == 0
    }

    pub fn record_count(&self) -> u16 {
        self.header.record_count
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("offset", &self.offset)
            .field("level", &self.header.level)
            .field("record_count", &self.header.record_count)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Page reads over a seekable byte source
pub struct PageSource<R> {
    source: R,
    header: FileHeader,
    key: Option<Key>,
    source_len: u64,
}

impl<R: Read + Seek> PageSource<R> {
    /// Read the file header and prepare for page reads
    pub fn new(mut source: R, key: Option<Key>) -> TpsResult<Self> {
        let source_len = source.seek(SeekFrom::End(0))?;
        if source_len < HEADER_SIZE as u64 {
            return Err(TpsError::OutOfRange {
                position: 0,
                wanted: HEADER_SIZE,
                length: source_len as usize,
            });
        }
        source.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; HEADER_SIZE];
        source.read_exact(&mut buf)?;
        let header = FileHeader::from_bytes(&buf)?;

        let key = match (header.is_encrypted(), key) {
            (true, None) => {
                return Err(TpsError::InvalidArgument(
                    "file is encrypted and no password was supplied".into(),
                ))
            }
            (false, Some(_)) => {
                tracing::debug!("file is not encrypted; ignoring password");
                None
            }
            (_, key) => key,
        };

        Ok(PageSource {
            source,
            header,
            key,
            source_len,
        })
    }

    /// Get the file header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Read, decrypt and expand the page at `reference`
    pub fn read_page(&mut self, reference: u32, length: u16) -> TpsResult<Page> {
        let offset = page_offset(reference);
        let length = length as usize;
        if length < PageHeader::SIZE {
            return Err(TpsError::FormatMismatch(format!(
                "page at 0x{:X} is only {} bytes long",
                offset, length
            )));
        }

        let span = match self.key {
            Some(_) => block_aligned(length),
            None => length,
        };
        if offset + span as u64 > self.source_len {
            return Err(TpsError::OutOfRange {
                position: offset as usize,
                wanted: span,
                length: self.source_len as usize,
            });
        }

        self.source.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; span];
        self.source.read_exact(&mut data)?;
        if let Some(ref key) = self.key {
            key.decrypt(&mut data)?;
        }

        let page = Page::from_bytes(offset, &data[..length])?;
        tracing::debug!(
            offset,
            level = page.header.level,
            records = page.header.record_count,
            compressed = page.header.is_compressed(),
            "read page"
        );
        Ok(page)
    }

    /// Give the byte source back
    pub fn into_inner(self) -> R {
        self.source
    }
}
