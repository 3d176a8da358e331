//! Field types and decoded values
//!
//! A table definition assigns every field a type code. Decoding a field is a
//! pure function of the bytes at its position and its descriptor.

pub mod decimal;
pub mod value;
pub mod decode;

pub use decimal::Decimal;
pub use decode::decode_field;
pub use value::Value;

use serde::Serialize;

/// Field type codes used by table definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    Byte,
    Short,
    UShort,
    Date,
    Time,
    Long,
    ULong,
    SReal,
    Real,
    Decimal,
    String,
    CString,
    PString,
    Group,
}

impl FieldType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => FieldType::Byte,
            0x02 => FieldType::Short,
            0x03 => FieldType::UShort,
            0x04 => FieldType::Date,
            0x05 => FieldType::Time,
            0x06 => FieldType::Long,
            0x07 => FieldType::ULong,
            0x08 => FieldType::SReal,
            0x09 => FieldType::Real,
            0x0A => FieldType::Decimal,
            0x12 => FieldType::String,
            0x13 => FieldType::CString,
            0x14 => FieldType::PString,
            0x16 => FieldType::Group,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            FieldType::Byte => 0x01,
            FieldType::Short => 0x02,
            FieldType::UShort => 0x03,
            FieldType::Date => 0x04,
            FieldType::Time => 0x05,
            FieldType::Long => 0x06,
            FieldType::ULong => 0x07,
            FieldType::SReal => 0x08,
            FieldType::Real => 0x09,
            FieldType::Decimal => 0x0A,
            FieldType::String => 0x12,
            FieldType::CString => 0x13,
            FieldType::PString => 0x14,
            FieldType::Group => 0x16,
        }
    }

    /// Width of one element for fixed-size types
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Byte => Some(1),
            FieldType::Short | FieldType::UShort => Some(2),
            FieldType::Date
            | FieldType::Time
            | FieldType::Long
            | FieldType::ULong
            | FieldType::SReal => Some(4),
            FieldType::Real => Some(8),
            _ => None,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, FieldType::String | FieldType::CString | FieldType::PString)
    }
}

/// Byte order of multi-byte numbers inside a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        for code in 0u8..=0xFF {
            if let Some(ty) = FieldType::from_code(code) {
                assert_eq!(ty.code(), code);
            }
        }
        assert_eq!(FieldType::from_code(0x16), Some(FieldType::Group));
        assert_eq!(FieldType::from_code(0x11), None);
        assert_eq!(FieldType::Real.fixed_size(), Some(8));
        assert_eq!(FieldType::Decimal.fixed_size(), None);
        assert!(FieldType::PString.is_string());
    }
}
