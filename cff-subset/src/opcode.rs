//! Operator codes for Type 2 charstrings and CFF DICTs.
//!
//! See "Appendix A Type 2 Charstring Command Codes" at
//! <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf#page=33>
//! and "Appendix H CFF DICT Encoding" at
//! <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf#page=49>

/// Escape byte that prefixes two byte operators.
pub const ESCAPE: u8 = 12;
/// Three byte integer operand: the opcode followed by a big-endian i16.
pub const SHORT_INT: u8 = 28;
/// Five byte DICT integer operand: the opcode followed by a big-endian i32.
pub const LONG_INT_DICT: u8 = 29;
/// Binary coded decimal DICT operand.
pub const BCD: u8 = 30;
/// First opcode of the positive two byte integer range (247..=250).
pub const TWO_BYTE_POS_INT0: u8 = 247;
/// First opcode of the negative two byte integer range (251..=254).
pub const TWO_BYTE_NEG_INT0: u8 = 251;
/// Five byte charstring operand: the opcode followed by a 16.16 value.
pub const FIXED_CS: u8 = 255;

/// Value added to the second byte of an escaped operator.
const ESCAPE_BASE: u16 = 256;

/// A charstring or DICT operator.
///
/// Operators that are prefixed with the [`ESCAPE`] byte occupy their own
/// range starting at 256, so a single value identifies any operator and
/// the escape protocol never has to be threaded through callers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct OpCode(u16);

impl OpCode {
    /// Creates a one byte operator.
    pub const fn new(byte: u8) -> Self {
        Self(byte as u16)
    }

    /// Creates an operator from the byte that follows an escape.
    pub const fn escaped(byte: u8) -> Self {
        Self(ESCAPE_BASE + byte as u16)
    }

    /// Returns true if this operator is encoded with a leading escape byte.
    pub const fn is_escaped(self) -> bool {
        self.0 >= ESCAPE_BASE
    }

    /// Returns the final byte of the encoded operator.
    pub const fn unescape(self) -> u8 {
        if self.is_escaped() {
            (self.0 - ESCAPE_BASE) as u8
        } else {
            self.0 as u8
        }
    }

    /// Number of bytes needed to encode this operator.
    pub const fn size(self) -> usize {
        if self.is_escaped() {
            2
        } else {
            1
        }
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Reads an operator starting at `b0`, consuming the escaped byte
    /// from `rest` when necessary.
    ///
    /// Returns the operator and the number of bytes it occupied.
    pub(crate) fn read(b0: u8, rest: &[u8]) -> Option<(Self, usize)> {
        if b0 == ESCAPE {
            rest.first().map(|b1| (Self::escaped(*b1), 2))
        } else {
            Some((Self::new(b0), 1))
        }
    }
}

/// Type 2 charstring operators.
pub mod cs {
    use super::OpCode;

    pub const HSTEM: OpCode = OpCode::new(1);
    pub const VSTEM: OpCode = OpCode::new(3);
    pub const VMOVETO: OpCode = OpCode::new(4);
    pub const RLINETO: OpCode = OpCode::new(5);
    pub const HLINETO: OpCode = OpCode::new(6);
    pub const VLINETO: OpCode = OpCode::new(7);
    pub const RRCURVETO: OpCode = OpCode::new(8);
    pub const CALLSUBR: OpCode = OpCode::new(10);
    pub const RETURN: OpCode = OpCode::new(11);
    pub const ENDCHAR: OpCode = OpCode::new(14);
    pub const VSINDEX: OpCode = OpCode::new(15);
    pub const BLEND: OpCode = OpCode::new(16);
    pub const HSTEMHM: OpCode = OpCode::new(18);
    pub const HINTMASK: OpCode = OpCode::new(19);
    pub const CNTRMASK: OpCode = OpCode::new(20);
    pub const RMOVETO: OpCode = OpCode::new(21);
    pub const HMOVETO: OpCode = OpCode::new(22);
    pub const VSTEMHM: OpCode = OpCode::new(23);
    pub const RCURVELINE: OpCode = OpCode::new(24);
    pub const RLINECURVE: OpCode = OpCode::new(25);
    pub const VVCURVETO: OpCode = OpCode::new(26);
    pub const HHCURVETO: OpCode = OpCode::new(27);
    pub const CALLGSUBR: OpCode = OpCode::new(29);
    pub const VHCURVETO: OpCode = OpCode::new(30);
    pub const HVCURVETO: OpCode = OpCode::new(31);

    pub const DOTSECTION: OpCode = OpCode::escaped(0);
    pub const HFLEX: OpCode = OpCode::escaped(34);
    pub const FLEX: OpCode = OpCode::escaped(35);
    pub const HFLEX1: OpCode = OpCode::escaped(36);
    pub const FLEX1: OpCode = OpCode::escaped(37);

    /// Returns true for the stem, mask and dotsection operators.
    pub fn is_hint_op(op: OpCode) -> bool {
        matches!(
            op,
            HSTEM | VSTEM | HSTEMHM | VSTEMHM | HINTMASK | CNTRMASK | DOTSECTION
        )
    }
}

/// CFF DICT operators.
pub mod dict {
    use super::OpCode;

    // Top DICT
    pub const VERSION: OpCode = OpCode::new(0);
    pub const NOTICE: OpCode = OpCode::new(1);
    pub const FULL_NAME: OpCode = OpCode::new(2);
    pub const FAMILY_NAME: OpCode = OpCode::new(3);
    pub const WEIGHT: OpCode = OpCode::new(4);
    pub const FONT_BBOX: OpCode = OpCode::new(5);
    pub const UNIQUE_ID: OpCode = OpCode::new(13);
    pub const XUID: OpCode = OpCode::new(14);
    pub const CHARSET: OpCode = OpCode::new(15);
    pub const ENCODING: OpCode = OpCode::new(16);
    pub const CHAR_STRINGS: OpCode = OpCode::new(17);
    pub const PRIVATE: OpCode = OpCode::new(18);
    pub const COPYRIGHT: OpCode = OpCode::escaped(0);
    pub const IS_FIXED_PITCH: OpCode = OpCode::escaped(1);
    pub const ITALIC_ANGLE: OpCode = OpCode::escaped(2);
    pub const UNDERLINE_POSITION: OpCode = OpCode::escaped(3);
    pub const UNDERLINE_THICKNESS: OpCode = OpCode::escaped(4);
    pub const PAINT_TYPE: OpCode = OpCode::escaped(5);
    pub const CHARSTRING_TYPE: OpCode = OpCode::escaped(6);
    pub const FONT_MATRIX: OpCode = OpCode::escaped(7);
    pub const STROKE_WIDTH: OpCode = OpCode::escaped(8);
    pub const SYNTHETIC_BASE: OpCode = OpCode::escaped(20);
    pub const POSTSCRIPT: OpCode = OpCode::escaped(21);
    pub const BASE_FONT_NAME: OpCode = OpCode::escaped(22);
    pub const BASE_FONT_BLEND: OpCode = OpCode::escaped(23);
    pub const ROS: OpCode = OpCode::escaped(30);
    pub const CID_FONT_VERSION: OpCode = OpCode::escaped(31);
    pub const CID_FONT_REVISION: OpCode = OpCode::escaped(32);
    pub const CID_FONT_TYPE: OpCode = OpCode::escaped(33);
    pub const CID_COUNT: OpCode = OpCode::escaped(34);
    pub const UID_BASE: OpCode = OpCode::escaped(35);
    pub const FD_ARRAY: OpCode = OpCode::escaped(36);
    pub const FD_SELECT: OpCode = OpCode::escaped(37);
    pub const FONT_NAME: OpCode = OpCode::escaped(38);

    // Private DICT
    pub const BLUE_VALUES: OpCode = OpCode::new(6);
    pub const OTHER_BLUES: OpCode = OpCode::new(7);
    pub const FAMILY_BLUES: OpCode = OpCode::new(8);
    pub const FAMILY_OTHER_BLUES: OpCode = OpCode::new(9);
    pub const STD_HW: OpCode = OpCode::new(10);
    pub const STD_VW: OpCode = OpCode::new(11);
    pub const SUBRS: OpCode = OpCode::new(19);
    pub const DEFAULT_WIDTH_X: OpCode = OpCode::new(20);
    pub const NOMINAL_WIDTH_X: OpCode = OpCode::new(21);
    pub const BLUE_SCALE: OpCode = OpCode::escaped(9);
    pub const BLUE_SHIFT: OpCode = OpCode::escaped(10);
    pub const BLUE_FUZZ: OpCode = OpCode::escaped(11);
    pub const STEM_SNAP_H: OpCode = OpCode::escaped(12);
    pub const STEM_SNAP_V: OpCode = OpCode::escaped(13);
    pub const FORCE_BOLD: OpCode = OpCode::escaped(14);
    pub const LANGUAGE_GROUP: OpCode = OpCode::escaped(17);
    pub const EXPANSION_FACTOR: OpCode = OpCode::escaped(18);
    pub const INITIAL_RANDOM_SEED: OpCode = OpCode::escaped(19);
}
