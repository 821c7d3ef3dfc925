//! Numeric operands of charstrings and DICTs.

use font_types::Fixed;

use crate::opcode::{FIXED_CS, SHORT_INT, TWO_BYTE_NEG_INT0, TWO_BYTE_POS_INT0};

/// Either an integer or a 16.16 fixed point value.
///
/// This mirrors the two kinds of numbers a Type 2 charstring can push on
/// its operand stack. See "3.2 Charstring Number Encoding" at
/// <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf#page=12>
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Number {
    Int(i32),
    Fixed(Fixed),
}

impl Number {
    /// Returns true if this number is an exact integer that a charstring
    /// can encode without the fixed point form.
    pub fn in_int_range(&self) -> bool {
        match self {
            Self::Int(value) => (i16::MIN as i32..=i16::MAX as i32).contains(value),
            Self::Fixed(value) => value.to_bits() & 0xFFFF == 0,
        }
    }

    /// Returns the integer part of this number.
    pub fn to_int(&self) -> i32 {
        match self {
            Self::Int(value) => *value,
            // arithmetic shift, rounds toward negative infinity which is
            // exact whenever the fraction is zero
            Self::Fixed(value) => value.to_bits() >> 16,
        }
    }

    /// Returns this number in 16.16 form, saturating integers that do not fit.
    pub fn to_fixed(&self) -> Fixed {
        match self {
            Self::Int(value) => {
                let clamped = (*value).clamp(i16::MIN as i32, i16::MAX as i32);
                Fixed::from_bits(clamped << 16)
            }
            Self::Fixed(value) => *value,
        }
    }

    /// Decodes a charstring number operand whose first byte is `b0` and
    /// whose remaining bytes start at `rest`.
    ///
    /// Returns the number and the total encoded length, or `None` if `b0`
    /// does not start a number or the operand is truncated.
    pub fn read_charstring(b0: u8, rest: &[u8]) -> Option<(Self, usize)> {
        match b0 {
            32..=246 => Some((Self::Int(b0 as i32 - 139), 1)),
            TWO_BYTE_POS_INT0..=250 => {
                let b1 = *rest.first()? as i32;
                let value = (b0 - TWO_BYTE_POS_INT0) as i32 * 256 + b1 + 108;
                Some((Self::Int(value), 2))
            }
            TWO_BYTE_NEG_INT0..=254 => {
                let b1 = *rest.first()? as i32;
                let value = -((b0 - TWO_BYTE_NEG_INT0) as i32 * 256) - b1 - 108;
                Some((Self::Int(value), 2))
            }
            SHORT_INT => {
                let bytes: [u8; 2] = rest.get(..2)?.try_into().ok()?;
                Some((Self::Int(i16::from_be_bytes(bytes) as i32), 3))
            }
            FIXED_CS => {
                let bytes: [u8; 4] = rest.get(..4)?.try_into().ok()?;
                Some((Self::Fixed(Fixed::from_bits(i32::from_be_bytes(bytes))), 5))
            }
            _ => None,
        }
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<Fixed> for Number {
    fn from(value: Fixed) -> Self {
        Self::Fixed(value)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => value.fmt(f),
            Self::Fixed(value) => value.fmt(f),
        }
    }
}
