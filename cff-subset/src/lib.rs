//! Building blocks for subsetting CFF tables.
//!
//! This crate holds the parts of a CFF subsetter that rewrite bytes:
//! charstring number encoding, re-serialization of the Top, Font and
//! Private DICTs, FDSelect planning, and desubroutinization of the
//! retained glyphs. Reading the source table is done with `read-fonts`
//! through [`CffAccelerator`].
//!
//! Output is produced in two passes. The size of every piece is computed
//! first, offsets are assigned with a [`LayoutCursor`], and only then are
//! bytes written. Offset operands in DICTs are always written in their
//! widest form so the first pass is exact.
//!
//! ```no_run
//! use cff_subset::{CffAccelerator, CffSubsetLayout, SubsetFlags};
//! use font_types::GlyphId;
//! # fn cff_table() -> &'static [u8] { &[] }
//!
//! let acc = CffAccelerator::new(cff_table()).unwrap();
//! let glyphs = [0, 3, 5].map(GlyphId::new);
//! let mut layout = CffSubsetLayout::plan(&acc, &glyphs, SubsetFlags::SUBSET_FLAGS_NO_HINTING).unwrap();
//! layout.assign_offsets(0x100).unwrap();
//! let tables = layout.serialize().unwrap();
//! ```

pub mod buffer;
pub mod charstring;
pub mod dict;
pub mod fdselect;
pub mod flatten;
pub mod index;
pub mod layout;
pub mod number;
pub mod offsets;
pub mod opcode;
pub mod serialize;
pub mod source;

#[cfg(test)]
mod test_font;

pub use buffer::CharstringBuffer;
pub use charstring::{CharstringError, CharstringVisitor, Interpreter};
pub use dict::{
    DictError, DictOpSerializer, FontDictSerializer, OpStr, PrivateDictSerializer,
    TopDictSerializer,
};
pub use fdselect::{
    plan_fdselect, write_fdselect, ConstantFd, FdRemap, FdSelectPlan, FdSelectRange,
    FdSelectSource,
};
pub use flatten::SubrFlattener;
pub use layout::{CffSubsetLayout, SerializedCff};
pub use number::Number;
pub use offsets::{LayoutCursor, OffsetTable, TableInfo};
pub use opcode::OpCode;
pub use serialize::{SerializeErrorFlags, Serializer};
pub use source::{CffAccelerator, CffSource};

use font_types::GlyphId;
use read_fonts::tables::postscript::Error as ReadError;
use thiserror::Error;

#[derive(Clone, Copy, Debug)]
pub struct SubsetFlags(u16);

impl SubsetFlags {
    //all flags at their default value of false.
    pub const SUBSET_FLAGS_DEFAULT: Self = Self(0x0000);

    //If set hint operators are removed from charstrings and hinting
    //parameters from the Private DICTs.
    pub const SUBSET_FLAGS_NO_HINTING: Self = Self(0x0001);

    //If set charstring integers outside the int16 range fail the subset
    //instead of being clamped.
    pub const SUBSET_FLAGS_STRICT_INT_RANGE: Self = Self(0x0002);

    /// Returns `true` if all of the flags in `other` are contained within `self`.
    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether hints are removed.
    ///
    /// Both the Private DICT rewriter and the flattener read this, so the
    /// two always agree.
    pub const fn drop_hints(&self) -> bool {
        self.contains(Self::SUBSET_FLAGS_NO_HINTING)
    }
}

impl Default for SubsetFlags {
    fn default() -> Self {
        Self::SUBSET_FLAGS_DEFAULT
    }
}

impl PartialEq for SubsetFlags {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::ops::BitOr for SubsetFlags {
    type Output = Self;

    /// Returns the union of the two sets of flags.
    #[inline]
    fn bitor(self, other: SubsetFlags) -> Self {
        Self(self.0 | other.0)
    }
}

impl From<u16> for SubsetFlags {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl std::ops::BitOrAssign for SubsetFlags {
    /// Adds the set of flags.
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

#[derive(Debug, Error)]
pub enum SubsetError {
    #[error("Serialization failed: {0}")]
    OutOfMemory(#[from] SerializeErrorFlags),

    #[error("Malformed charstring for glyph {gid}: {error}")]
    MalformedInput { gid: GlyphId, error: CharstringError },

    #[error("Offset {0} does not fit in 32 bits")]
    OffsetOverflow(u64),

    #[error("Wrote {actual} bytes where {expected} were planned")]
    InconsistentSize { expected: usize, actual: usize },

    #[error("Invalid FDSelect: {0}")]
    InvalidFdSelect(String),

    #[error("Invalid DICT data: {0}")]
    InvalidDict(#[from] DictError),

    #[error("Error reading font data: {0}")]
    ReadError(ReadError),
}
