//! Decoded field values

use chrono::{NaiveDate, NaiveTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::Decimal;

/// A decoded field, memo or blob value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    SReal(f32),
    Real(f64),
    /// Fixed-width text with trailing spaces removed
    String(String),
    /// Text up to the first NUL
    CString(String),
    /// Length-prefixed text
    PString(String),
    /// `None` for the zero date
    Date(Option<NaiveDate>),
    Time(NaiveTime),
    Decimal(Decimal),
    /// Named members in declared order
    Group(Vec<(String, Value)>),
    Array(Vec<Value>),
    Memo(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::CString(s) | Value::PString(s) | Value::Memo(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer variant widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::UShort(v) => Some(v as i64),
            Value::Long(v) => Some(v as i64),
            Value::ULong(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::SReal(v) => Some(v as f64),
            Value::Real(v) => Some(v),
            Value::Decimal(d) => Some(d.to_f64()),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match *self {
            Value::Date(d) => d,
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match *self {
            Value::Time(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match *self {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Group(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Look up a group member by name
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.as_group()?
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, value)| value)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::UShort(_) => "UShort",
            Value::Long(_) => "Long",
            Value::ULong(_) => "ULong",
            Value::SReal(_) => "SReal",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::CString(_) => "CString",
            Value::PString(_) => "PString",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::Decimal(_) => "Decimal",
            Value::Group(_) => "Group",
            Value::Array(_) => "Array",
            Value::Memo(_) => "Memo",
            Value::Blob(_) => "Blob",
        }
    }
}

/// Ordered name/value pairs as a map
pub(crate) fn serialize_pairs<S: Serializer>(
    pairs: &[(String, Value)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (name, value) in pairs {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Byte(v) => serializer.serialize_u8(*v),
            Value::Short(v) => serializer.serialize_i16(*v),
            Value::UShort(v) => serializer.serialize_u16(*v),
            Value::Long(v) => serializer.serialize_i32(*v),
            Value::ULong(v) => serializer.serialize_u32(*v),
            Value::SReal(v) => serializer.serialize_f32(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::String(s) | Value::CString(s) | Value::PString(s) | Value::Memo(s) => {
                serializer.serialize_str(s)
            }
            Value::Date(d) => d.serialize(serializer),
            Value::Time(t) => t.serialize(serializer),
            Value::Decimal(d) => d.serialize(serializer),
            Value::Group(members) => serialize_pairs(members, serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Blob(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::UShort(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::ULong(v) => write!(f, "{}", v),
            Value::SReal(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::String(s) | Value::CString(s) | Value::PString(s) | Value::Memo(s) => {
                f.write_str(s)
            }
            Value::Date(Some(d)) => write!(f, "{}", d),
            Value::Date(None) => Ok(()),
            Value::Time(t) => write!(f, "{}", t),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Group(members) => {
                f.write_str("{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}
