//! Field decoding against a descriptor

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveTime};

use super::{Decimal, Endian, FieldType, Value};
use crate::error::{TpsError, TpsResult};
use crate::records::table_def::FieldDescriptor;
use crate::storage::reader::{apply_rule, StringRule};

/// Decode `field` from `record`, the payload of a data record or the span of
/// an enclosing group. `table` names the table in error messages.
pub fn decode_field(record: &[u8], field: &FieldDescriptor, table: &str) -> TpsResult<Value> {
    let start = field.offset as usize;
    let end = start + field.length as usize;
    let span = record.get(start..end).ok_or_else(|| {
        TpsError::decoding(
            table,
            &field.name,
            format!(
                "span {}..{} lies outside the {} byte record",
                start,
                end,
                record.len()
            ),
        )
    })?;

    if !field.is_array() {
        return decode_element(span, field, table);
    }

    let elements = field.elements as usize;
    if span.len() % elements != 0 {
        return Err(TpsError::decoding(
            table,
            &field.name,
            format!("{} bytes do not split into {} elements", span.len(), elements),
        ));
    }
    span.chunks_exact(span.len() / elements)
        .map(|element| decode_element(element, field, table))
        .collect::<TpsResult<Vec<_>>>()
        .map(Value::Array)
}

fn decode_element(span: &[u8], field: &FieldDescriptor, table: &str) -> TpsResult<Value> {
    let fail = |reason: String| TpsError::decoding(table, &field.name, reason);

    if let Some(size) = field.field_type.fixed_size() {
        if span.len() != size {
            return Err(fail(format!(
                "{:?} needs {} bytes, field is {} wide",
                field.field_type,
                size,
                span.len()
            )));
        }
    }

    match field.endian {
        Endian::Little => decode_scalar::<LittleEndian>(span, field, table),
        Endian::Big => decode_scalar::<BigEndian>(span, field, table),
    }
}

fn decode_scalar<B: ByteOrder>(
    span: &[u8],
    field: &FieldDescriptor,
    table: &str,
) -> TpsResult<Value> {
    let fail = |reason: String| TpsError::decoding(table, &field.name, reason);

    Ok(match field.field_type {
        FieldType::Byte => Value::Byte(span[0]),
        FieldType::Short => Value::Short(B::read_i16(span)),
        FieldType::UShort => Value::UShort(B::read_u16(span)),
        FieldType::Long => Value::Long(B::read_i32(span)),
        FieldType::ULong => Value::ULong(B::read_u32(span)),
        FieldType::SReal => Value::SReal(B::read_f32(span)),
        FieldType::Real => Value::Real(B::read_f64(span)),
        FieldType::Date => Value::Date(unpack_date(B::read_u32(span)).map_err(fail)?),
        FieldType::Time => Value::Time(unpack_time(B::read_u32(span)).map_err(fail)?),
        FieldType::Decimal => {
            Value::Decimal(Decimal::from_bcd(span, field.places).map_err(fail)?)
        }
        FieldType::String => Value::String(text(span, StringRule::TrimSpaces, field, table)?),
        FieldType::CString => {
            Value::CString(text(span, StringRule::NullTerminated, field, table)?)
        }
        FieldType::PString => {
            Value::PString(text(span, StringRule::LengthPrefixed, field, table)?)
        }
        FieldType::Group => Value::Group(
            field
                .members
                .iter()
                .map(|member| Ok((member.name.clone(), decode_field(span, member, table)?)))
                .collect::<TpsResult<Vec<_>>>()?,
        ),
    })
}

fn text(span: &[u8], rule: StringRule, field: &FieldDescriptor, table: &str) -> TpsResult<String> {
    apply_rule(span, rule).map_err(|err| TpsError::decoding(table, &field.name, err.to_string()))
}

/// Year in the high word, then month and day bytes. Zero means no date.
fn unpack_date(packed: u32) -> Result<Option<NaiveDate>, String> {
    if packed == 0 {
        return Ok(None);
    }
    let year = (packed >> 16) as i32;
    let month = (packed >> 8) & 0xFF;
    let day = packed & 0xFF;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(|| format!("{:04}-{:02}-{:02} is not a calendar date", year, month, day))
}

/// Hours, minutes, seconds and centiseconds from high byte to low
fn unpack_time(packed: u32) -> Result<NaiveTime, String> {
    let hours = (packed >> 24) & 0x7F;
    let minutes = (packed >> 16) & 0xFF;
    let seconds = (packed >> 8) & 0xFF;
    let centis = packed & 0xFF;
    if centis > 99 {
        return Err(format!("{} centiseconds", centis));
    }
    NaiveTime::from_hms_milli_opt(hours, minutes, seconds, centis * 10).ok_or_else(|| {
        format!(
            "{:02}:{:02}:{:02}.{:02} is not a time of day",
            hours, minutes, seconds, centis
        )
    })
}
