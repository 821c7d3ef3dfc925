//! Placement of the re-serialized CFF sub-tables.

use crate::SubsetError;

/// Location of one sub-table in the output, in bytes from the start of the
/// CFF table.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct TableInfo {
    pub offset: u32,
    pub size: u32,
}

impl TableInfo {
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// Where each sub-table of the subset CFF table will be written.
///
/// Filled in between the size pass and the emit pass, then read by the
/// DICT serializers when they write offset operands. The Top DICT and the
/// global subroutines are written by the caller ahead of the laid out
/// tables, so only their sizes are recorded here.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct OffsetTable {
    pub top_dict: TableInfo,
    pub fd_select: TableInfo,
    pub fd_array: TableInfo,
    pub char_strings: TableInfo,
    pub global_subrs: TableInfo,
    /// Start of the contiguous run of Private DICTs.
    pub private_dicts_offset: u32,
    /// Private DICT of each retained Font DICT, in new FD order.
    pub private_dicts: Vec<TableInfo>,
    /// Local subroutines for each Font DICT.
    pub local_subrs: Vec<TableInfo>,
}

/// Hands out consecutive, overflow checked table positions.
#[derive(Clone, Debug)]
pub struct LayoutCursor {
    position: u64,
}

impl LayoutCursor {
    pub fn new(start: u32) -> Self {
        Self {
            position: start as u64,
        }
    }

    pub fn position(&self) -> u32 {
        // `place` never lets the position exceed u32::MAX
        self.position as u32
    }

    /// Reserves `size` bytes at the current position.
    ///
    /// Fails when the table would end beyond what a 32-bit offset can
    /// address.
    pub fn place(&mut self, size: usize) -> Result<TableInfo, SubsetError> {
        let end = self.position + size as u64;
        if end > u32::MAX as u64 {
            return Err(SubsetError::OffsetOverflow(end));
        }
        let info = TableInfo {
            offset: self.position as u32,
            size: size as u32,
        };
        self.position = end;
        Ok(info)
    }
}
