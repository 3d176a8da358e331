//! Packed BCD decimals
//!
//! The first nibble holds the sign (zero for positive), every following
//! nibble one digit. The number of digits after the point comes from the
//! field descriptor, not from the bytes.

use serde::{Serialize, Serializer};

/// Exact decimal value: `mantissa * 10^-scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub mantissa: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Decimal { mantissa, scale }
    }

    /// Unpack BCD bytes. Returns a message describing the first bad nibble.
    pub fn from_bcd(bytes: &[u8], scale: u8) -> Result<Self, String> {
        let mut nibbles = bytes.iter().flat_map(|b| [b >> 4, b & 0x0F]);
        let negative = match nibbles.next() {
            Some(sign) => sign != 0,
            None => return Err("empty decimal".to_string()),
        };

        let mut mantissa: i128 = 0;
        for (position, digit) in nibbles.enumerate() {
            if digit > 9 {
                return Err(format!("nibble {} holds 0x{:X}, not a digit", position + 1, digit));
            }
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit as i128))
                .ok_or_else(|| "too many digits".to_string())?;
        }

        Ok(Decimal {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.is_negative() { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, whole, fraction)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
