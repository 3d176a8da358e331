//! Positional byte reader over an in-memory span
//!
//! Pages are small, so they are always decoded from a buffer that was read
//! (and decrypted / expanded) in one go. The reader never looks past the end
//! of the span it was created over; bounding reads to a page or a record is
//! done by handing out sub-readers.

use byteorder::ByteOrder;

use crate::error::{TpsError, TpsResult};

/// How a fixed-length byte span is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRule {
    /// Whole span, trailing spaces removed
    TrimSpaces,
    /// First byte holds the length of the text that follows
    LengthPrefixed,
    /// Text ends at the first NUL byte (or at the end of the span)
    NullTerminated,
}

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Apply a string rule to a span that has already been cut to the field width
pub fn apply_rule(span: &[u8], rule: StringRule) -> TpsResult<String> {
    match rule {
        StringRule::TrimSpaces => {
            let end = span
                .iter()
                .rposition(|&b| b != b' ')
                .map(|i| i + 1)
                .unwrap_or(0);
            Ok(latin1(&span[..end]))
        }
        StringRule::LengthPrefixed => {
            let len = *span.first().ok_or(TpsError::OutOfRange {
                position: 0,
                wanted: 1,
                length: 0,
            })? as usize;
            if len + 1 > span.len() {
                return Err(TpsError::OutOfRange {
                    position: 1,
                    wanted: len,
                    length: span.len(),
                });
            }
            Ok(latin1(&span[1..=len]))
        }
        StringRule::NullTerminated => {
            let end = span.iter().position(|&b| b == 0).unwrap_or(span.len());
            Ok(latin1(&span[..end]))
        }
    }
}

/// Cursor over a byte span with typed primitive reads
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Current position relative to the start of the span
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the span
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Look at a byte without moving
    pub fn peek_u8(&self, at: usize) -> TpsResult<u8> {
        self.data.get(at).copied().ok_or(TpsError::OutOfRange {
            position: at,
            wanted: 1,
            length: self.data.len(),
        })
    }

    fn take(&mut self, n: usize) -> TpsResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(TpsError::OutOfRange {
                position: self.pos,
                wanted: n,
                length: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, n: usize) -> TpsResult<&'a [u8]> {
        self.take(n)
    }

    /// Everything from the current position to the end of the span
    pub fn read_rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }

    pub fn read_u8(&mut self) -> TpsResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> TpsResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16<B: ByteOrder>(&mut self) -> TpsResult<u16> {
        Ok(B::read_u16(self.take(2)?))
    }

    pub fn read_i16<B: ByteOrder>(&mut self) -> TpsResult<i16> {
        Ok(B::read_i16(self.take(2)?))
    }

    pub fn read_u32<B: ByteOrder>(&mut self) -> TpsResult<u32> {
        Ok(B::read_u32(self.take(4)?))
    }

    pub fn read_i32<B: ByteOrder>(&mut self) -> TpsResult<i32> {
        Ok(B::read_i32(self.take(4)?))
    }

    pub fn read_f32<B: ByteOrder>(&mut self) -> TpsResult<f32> {
        Ok(B::read_f32(self.take(4)?))
    }

    pub fn read_f64<B: ByteOrder>(&mut self) -> TpsResult<f64> {
        Ok(B::read_f64(self.take(8)?))
    }

    /// Read `len` bytes and turn them into text with the given rule
    pub fn read_string(&mut self, len: usize, rule: StringRule) -> TpsResult<String> {
        let span = self.take(len)?;
        apply_rule(span, rule)
    }

    /// Read a NUL-terminated string; the terminator is consumed but not returned
    pub fn read_zstring(&mut self) -> TpsResult<String> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).ok_or(TpsError::OutOfRange {
            position: self.pos,
            wanted: rest.len() + 1,
            length: self.data.len(),
        })?;
        let text = latin1(&rest[..end]);
        self.pos += end + 1;
        Ok(text)
    }

    /// Split off a reader bounded to the next `n` bytes
    pub fn sub_reader(&mut self, n: usize) -> TpsResult<ByteReader<'a>> {
        Ok(ByteReader::new(self.take(n)?))
    }
}
