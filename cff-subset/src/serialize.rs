//! serializer
//! ported from Harfbuzz Serializer: <https://github.com/harfbuzz/harfbuzz/blob/5e32b5ca8fe430132b87c0eee6a1c056d37c35eb/src/hb-serialize.hh>
//!
//! CFF sub-tables are laid out in two passes: every piece reports its
//! size first, then bytes are written once all offsets are known. The
//! serializer is therefore created with the exact capacity computed by the
//! size pass and running out of room means the two passes disagreed.

use font_types::Scalar;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeErrorFlags(u16);

impl SerializeErrorFlags {
    pub const SERIALIZE_ERROR_NONE: Self = Self(0x0000);
    pub const SERIALIZE_ERROR_OTHER: Self = Self(0x0001);
    pub const SERIALIZE_ERROR_OFFSET_OVERFLOW: Self = Self(0x0002);
    pub const SERIALIZE_ERROR_OUT_OF_ROOM: Self = Self(0x0004);
    pub const SERIALIZE_ERROR_INT_OVERFLOW: Self = Self(0x0008);
    pub const SERIALIZE_ERROR_ARRAY_OVERFLOW: Self = Self(0x0010);

    /// Returns `true` if all of the flags in `other` are contained within `self`.
    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl Default for SerializeErrorFlags {
    fn default() -> Self {
        Self::SERIALIZE_ERROR_NONE
    }
}

impl std::ops::BitOrAssign for SerializeErrorFlags {
    /// Adds the set of flags.
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::Not for SerializeErrorFlags {
    type Output = bool;
    #[inline]
    fn not(self) -> bool {
        self == SerializeErrorFlags::SERIALIZE_ERROR_NONE
    }
}

impl std::fmt::Display for SerializeErrorFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "serialize error flags {:#06x}", self.0)
    }
}

impl std::error::Error for SerializeErrorFlags {}

/// A fixed capacity byte sink with sticky error state.
#[derive(Default)]
pub struct Serializer {
    head: usize,
    errors: SerializeErrorFlags,
    data: Vec<u8>,
}

impl Serializer {
    pub fn new(size: u32) -> Self {
        Serializer {
            data: vec![0; size as usize],
            ..Default::default()
        }
    }

    /// Embed a single Scalar type, returning the position it was written at.
    pub fn embed(&mut self, obj: impl Scalar) -> Result<usize, SerializeErrorFlags> {
        let raw = obj.to_raw();
        self.embed_bytes(raw.as_ref())
    }

    /// Copy the given bytes, returning the position they were written at.
    pub fn embed_bytes(&mut self, bytes: &[u8]) -> Result<usize, SerializeErrorFlags> {
        let size = bytes.len();
        let ret = self.allocate_size(size)?;
        self.data[ret..ret + size].copy_from_slice(bytes);
        Ok(ret)
    }

    // Allocate size
    pub fn allocate_size(&mut self, size: usize) -> Result<usize, SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }

        if size > u32::MAX as usize || self.data.len() - self.head < size {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        }

        let ret = self.head;
        self.head += size;
        Ok(ret)
    }

    /// Number of bytes written so far.
    pub fn length(&self) -> usize {
        self.head
    }

    /// Number of bytes that can still be written.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn successful(&self) -> bool {
        !self.errors
    }

    pub fn in_error(&self) -> bool {
        !!self.errors
    }

    pub fn errors(&self) -> SerializeErrorFlags {
        self.errors
    }

    pub fn set_err(&mut self, error_type: SerializeErrorFlags) -> SerializeErrorFlags {
        self.errors |= error_type;
        self.errors
    }

    /// Returns the written bytes.
    ///
    /// Any capacity that was not written is dropped.
    pub fn copy_bytes(mut self) -> Result<Vec<u8>, SerializeErrorFlags> {
        if !self.successful() {
            return Err(self.errors);
        }
        self.data.truncate(self.head);
        Ok(self.data)
    }
}
