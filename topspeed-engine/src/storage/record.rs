//! Raw records stored in leaf pages
//!
//! Leaf records are prefix-compressed against their predecessor. Each one
//! starts with a flags byte:
//! - bit 0x80: a u16 record length follows (otherwise inherited)
//! - bit 0x40: a u16 header length follows (otherwise inherited)
//! - bits 0x3F: number of leading bytes shared with the previous record
//!
//! The first `header length` bytes of a record are its header, which also
//! serves as the record's sort key.

use byteorder::LittleEndian;
use bytes::Bytes;

use super::reader::ByteReader;
use crate::error::{TpsError, TpsResult};

const HAS_RECORD_LENGTH: u8 = 0x80;
const HAS_HEADER_LENGTH: u8 = 0x40;
const COPY_MASK: u8 = 0x3F;

/// One record as stored in a leaf page, not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    data: Bytes,
    header_len: usize,
}

impl RawRecord {
    /// Build a record from its full bytes and header length
    pub fn new(data: Bytes, header_len: usize) -> TpsResult<Self> {
        if header_len > data.len() {
            return Err(TpsError::FormatMismatch(format!(
                "record header of {} bytes exceeds record length {}",
                header_len,
                data.len()
            )));
        }
        Ok(RawRecord { data, header_len })
    }

    /// Header bytes; also the record key
    pub fn header(&self) -> &[u8] {
        &self.data[..self.header_len]
    }

    /// Bytes after the header
    pub fn payload(&self) -> Bytes {
        self.data.slice(self.header_len..)
    }

    /// Header and payload together
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Parse `count` prefix-compressed records from an expanded leaf payload
pub fn parse_records(payload: &[u8], count: u16) -> TpsResult<Vec<RawRecord>> {
    let mut rx = ByteReader::new(payload);
    let mut records: Vec<RawRecord> = Vec::with_capacity(count as usize);

    for index in 0..count {
        let flags = rx.read_u8()?;
        let previous = records.last();

        if previous.is_none() && flags & (HAS_RECORD_LENGTH | HAS_HEADER_LENGTH)
            != HAS_RECORD_LENGTH | HAS_HEADER_LENGTH
        {
            return Err(TpsError::FormatMismatch(format!(
                "first record of a leaf must carry both lengths (flags 0x{:02X})",
                flags
            )));
        }

        let record_len = if flags & HAS_RECORD_LENGTH != 0 {
            rx.read_u16::<LittleEndian>()? as usize
        } else {
            previous.map(|r| r.len()).unwrap_or(0)
        };
        let header_len = if flags & HAS_HEADER_LENGTH != 0 {
            rx.read_u16::<LittleEndian>()? as usize
        } else {
            previous.map(|r| r.header_len).unwrap_or(0)
        };

        let copy = (flags & COPY_MASK) as usize;
        let shared = previous.map(|r| r.data()).unwrap_or(&[]);
        if copy > shared.len() || copy > record_len {
            return Err(TpsError::FormatMismatch(format!(
                "record {} copies {} bytes but only {} are available",
                index,
                copy,
                shared.len().min(record_len)
            )));
        }

        let mut data = Vec::with_capacity(record_len);
        data.extend_from_slice(&shared[..copy]);
        data.extend_from_slice(rx.read_bytes(record_len - copy)?);
        let record = RawRecord::new(Bytes::from(data), header_len)?;
        tracing::trace!(index, len = record.len(), header_len, "parsed record");
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_prefix_compression() {
        let mut payload = vec![0xC0];
        payload.extend_from_slice(&6u16.to_le_bytes());
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(b"ABcdef");
        // shares "ABcd", lengths inherited
        payload.push(0x04);
        payload.extend_from_slice(b"XY");
        // new record length, shares "AB"
        payload.push(0x82);
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.push(b'Z');

        let records = parse_records(&payload, 3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].data(), b"ABcdef");
        assert_eq!(records[1].data(), b"ABcdXY");
        assert_eq!(records[1].header(), b"AB");
        assert_eq!(&records[1].payload()[..], b"cdXY");
        assert_eq!(records[2].data(), b"ABZ");
    }

    #[test]
    fn test_first_record_needs_lengths() {
        let payload = [0x00, 1, 2, 3];
        let err = parse_records(&payload, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    }

    #[test]
    fn test_copy_beyond_previous() {
        let mut payload = vec![0xC0];
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(b"ab");
        payload.push(0x03);
        let err = parse_records(&payload, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    }

    #[test]
    fn test_truncated_leaf() {
        let mut payload = vec![0xC0];
        payload.extend_from_slice(&8u16.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(b"abc");
        let err = parse_records(&payload, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }
}
