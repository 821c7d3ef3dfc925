//! Growable byte buffer used to build charstrings.

use crate::{
    number::Number,
    opcode::{OpCode, ESCAPE, FIXED_CS, SHORT_INT, TWO_BYTE_NEG_INT0, TWO_BYTE_POS_INT0},
    serialize::SerializeErrorFlags,
};

/// Byte sink with encoders for Type 2 charstring operands and operators.
///
/// Failures are sticky: once an append fails, every later append fails with
/// the same flags and the buffer contents should be discarded.
#[derive(Clone, Default, Debug)]
pub struct CharstringBuffer {
    data: Vec<u8>,
    errors: SerializeErrorFlags,
    strict_int_range: bool,
}

impl CharstringBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that reports integers outside the int16 range as
    /// errors instead of saturating them.
    pub fn with_strict_int_range() -> Self {
        Self {
            strict_int_range: true,
            ..Default::default()
        }
    }

    pub fn append_byte(&mut self, byte: u8) -> Result<(), SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }
        if self.data.try_reserve(1).is_err() {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        }
        self.data.push(byte);
        Ok(())
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }
        if self.data.try_reserve(bytes.len()).is_err() {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Appends an integer using the shortest charstring encoding.
    ///
    /// Values outside the int16 range are clamped to it unless the buffer
    /// was created with [`with_strict_int_range`](Self::with_strict_int_range).
    pub fn append_int(&mut self, value: i32) -> Result<(), SerializeErrorFlags> {
        if (-1131..=1131).contains(&value) {
            if (-107..=107).contains(&value) {
                return self.append_byte((value + 139) as u8);
            }
            let (base, magnitude) = if value > 0 {
                (TWO_BYTE_POS_INT0, value - 108)
            } else {
                (TWO_BYTE_NEG_INT0, -value - 108)
            };
            return self.append_bytes(&[(magnitude >> 8) as u8 + base, (magnitude & 0xFF) as u8]);
        }
        let clamped = value.clamp(i16::MIN as i32, i16::MAX as i32);
        if clamped != value && self.strict_int_range {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW));
        }
        let [hi, lo] = (clamped as i16).to_be_bytes();
        self.append_bytes(&[SHORT_INT, hi, lo])
    }

    /// Appends a number, using the fixed point form only when the value is
    /// not an exact integer.
    pub fn append_number(&mut self, number: Number) -> Result<(), SerializeErrorFlags> {
        match number {
            Number::Fixed(value) if !number.in_int_range() => {
                let [b0, b1, b2, b3] = value.to_bits().to_be_bytes();
                self.append_bytes(&[FIXED_CS, b0, b1, b2, b3])
            }
            _ => self.append_int(number.to_int()),
        }
    }

    pub fn append_op(&mut self, op: OpCode) -> Result<(), SerializeErrorFlags> {
        if op.is_escaped() {
            self.append_bytes(&[ESCAPE, op.unescape()])
        } else {
            self.append_byte(op.unescape())
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn in_error(&self) -> bool {
        !!self.errors
    }

    fn set_err(&mut self, error_type: SerializeErrorFlags) -> SerializeErrorFlags {
        self.errors |= error_type;
        self.errors
    }

    /// Consumes the buffer, returning the encoded bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }
        Ok(self.data)
    }
}
