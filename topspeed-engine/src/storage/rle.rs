//! Run-length expansion of compressed page payloads
//!
//! The stream alternates literal runs and repeat runs. A literal run is a
//! count followed by that many bytes. A repeat run is a count of extra copies
//! of the last byte written. Counts use one byte below 0x80, otherwise two
//! bytes carrying fifteen bits.

use crate::error::{TpsError, TpsResult};

/// Expand `input` into exactly `expected_len` bytes
pub fn expand(input: &[u8], expected_len: usize) -> TpsResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut pos = 0usize;

    while pos < input.len() {
        let literal = read_count(input, &mut pos, "literal")?;
        let end = pos + literal;
        if end > input.len() {
            return Err(TpsError::RunLength(format!(
                "literal run of {} bytes at offset {} is truncated",
                literal, pos
            )));
        }
        push_checked(&mut out, &input[pos..end], expected_len)?;
        pos = end;

        if pos >= input.len() {
            break;
        }

        let repeats = read_count(input, &mut pos, "repeat")?;
        let last = *out.last().ok_or_else(|| {
            TpsError::RunLength(format!(
                "repeat run at offset {} refers back to empty output",
                pos
            ))
        })?;
        if out.len() + repeats > expected_len {
            return Err(overflow(out.len() + repeats, expected_len));
        }
        out.resize(out.len() + repeats, last);
    }

    if out.len() != expected_len {
        return Err(TpsError::RunLength(format!(
            "expanded to {} bytes, expected {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

fn read_count(input: &[u8], pos: &mut usize, what: &str) -> TpsResult<usize> {
    let at = *pos;
    let truncated = || TpsError::RunLength(format!("{} count at offset {} is truncated", what, at));
    let first = *input.get(*pos).ok_or_else(truncated)? as usize;
    if first < 0x80 {
        *pos += 1;
        return Ok(first);
    }
    let second = *input.get(*pos + 1).ok_or_else(truncated)? as usize;
    *pos += 2;
    Ok((second << 7) | (first & 0x7F))
}

fn push_checked(out: &mut Vec<u8>, bytes: &[u8], expected_len: usize) -> TpsResult<()> {
    if out.len() + bytes.len() > expected_len {
        return Err(overflow(out.len() + bytes.len(), expected_len));
    }
    out.extend_from_slice(bytes);
    Ok(())
}

fn overflow(got: usize, expected_len: usize) -> TpsError {
    TpsError::RunLength(format!(
        "expansion reaches {} bytes, more than the declared {}",
        got, expected_len
    ))
}
