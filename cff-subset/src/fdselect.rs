//! FDSelect planning and serialization.
//!
//! See "19 FDSelect" at <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf#page=28>

use std::collections::BTreeSet;

use fnv::FnvHashMap;
use font_types::GlyphId;
use read_fonts::tables::postscript::FdSelect;

use crate::{
    serialize::{SerializeErrorFlags, Serializer},
    SubsetError,
};

/// FD indices are written as single bytes.
pub const MAX_FD_COUNT: usize = 256;

/// Anything that maps a source glyph to the Font DICT it uses.
pub trait FdSelectSource {
    fn fd_of(&self, gid: GlyphId) -> Option<u16>;
}

impl FdSelectSource for FdSelect<'_> {
    fn fd_of(&self, gid: GlyphId) -> Option<u16> {
        self.font_index(gid)
    }
}

impl FdSelectSource for [u8] {
    fn fd_of(&self, gid: GlyphId) -> Option<u16> {
        self.get(gid.to_u32() as usize).map(|fd| *fd as u16)
    }
}

impl FdSelectSource for [u16] {
    fn fd_of(&self, gid: GlyphId) -> Option<u16> {
        self.get(gid.to_u32() as usize).copied()
    }
}

/// Every glyph uses the same Font DICT.
///
/// This is the situation for fonts that are not CID-keyed.
#[derive(Copy, Clone, Default, Debug)]
pub struct ConstantFd(pub u16);

impl FdSelectSource for ConstantFd {
    fn fd_of(&self, _gid: GlyphId) -> Option<u16> {
        Some(self.0)
    }
}

/// Mapping from source FD indices to FD indices in the subset.
///
/// New indices are handed out in insertion order.
#[derive(Clone, Default, Debug)]
pub struct FdRemap {
    forw_map: FnvHashMap<u16, u16>,
    back_map: Vec<u16>,
}

impl FdRemap {
    pub fn len(&self) -> usize {
        self.back_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.back_map.is_empty()
    }

    /// Maps `old_fd` to the next free index unless it is already mapped.
    /// Returns the new index.
    pub fn add(&mut self, old_fd: u16) -> u16 {
        match self.forw_map.get(&old_fd) {
            Some(&new_fd) => new_fd,
            None => {
                let new_fd = self.back_map.len() as u16;
                self.forw_map.insert(old_fd, new_fd);
                self.back_map.push(old_fd);
                new_fd
            }
        }
    }

    pub fn get(&self, old_fd: u16) -> Option<u16> {
        self.forw_map.get(&old_fd).copied()
    }

    pub fn get_backward(&self, new_fd: u16) -> Option<u16> {
        self.back_map.get(new_fd as usize).copied()
    }

    /// Source FDs in the order of their new indices.
    pub fn old_fds(&self) -> impl Iterator<Item = u16> + '_ {
        self.back_map.iter().copied()
    }
}

/// A run of consecutive new glyphs sharing one FD.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct FdSelectRange {
    pub first: u32,
    pub fd: u16,
}

/// Everything needed to write the FDSelect of a subset.
#[derive(Clone, Debug)]
pub struct FdSelectPlan {
    /// Either 0 or 3.
    pub format: u8,
    /// Number of Font DICTs in the subset.
    pub fd_count: usize,
    pub size_bytes: usize,
    pub num_glyphs: u32,
    /// Maximal runs of equal FDs, using new FD indices.
    pub ranges: Vec<FdSelectRange>,
    pub fd_remap: FdRemap,
}

impl FdSelectPlan {
    /// Returns the new FD of the glyph at position `new_gid` in the subset.
    pub fn fd_of_new_glyph(&self, new_gid: u32) -> Option<u16> {
        if new_gid >= self.num_glyphs {
            return None;
        }
        let ix = self
            .ranges
            .partition_point(|range| range.first <= new_gid)
            .checked_sub(1)?;
        Some(self.ranges[ix].fd)
    }

    /// Iterates over the new FD of every subset glyph.
    fn glyph_fds(&self) -> impl Iterator<Item = u16> + '_ {
        self.ranges.iter().enumerate().flat_map(|(ix, range)| {
            let end = self
                .ranges
                .get(ix + 1)
                .map(|next| next.first)
                .unwrap_or(self.num_glyphs);
            (range.first..end).map(move |_| range.fd)
        })
    }
}

/// Plans a compact FDSelect for `glyphs`, where position `i` in `glyphs`
/// becomes new glyph `i`.
///
/// Only Font DICTs that are used by some retained glyph survive and they
/// keep their relative order.
pub fn plan_fdselect<S: FdSelectSource + ?Sized>(
    glyphs: &[GlyphId],
    fd_count: usize,
    src: &S,
) -> Result<FdSelectPlan, SubsetError> {
    if fd_count > MAX_FD_COUNT {
        return Err(SubsetError::InvalidFdSelect(format!(
            "{fd_count} Font DICTs exceeds the limit of {MAX_FD_COUNT}"
        )));
    }
    if glyphs.len() > u16::MAX as usize {
        return Err(SubsetError::InvalidFdSelect(format!(
            "{} glyphs do not fit in a CFF FDSelect",
            glyphs.len()
        )));
    }
    let old_fds = glyphs
        .iter()
        .map(|gid| {
            let fd = src.fd_of(*gid).ok_or_else(|| {
                SubsetError::InvalidFdSelect(format!("no Font DICT for glyph {gid}"))
            })?;
            if fd as usize >= fd_count {
                return Err(SubsetError::InvalidFdSelect(format!(
                    "glyph {gid} selects Font DICT {fd} of {fd_count}"
                )));
            }
            Ok(fd)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut fd_remap = FdRemap::default();
    for fd in old_fds.iter().copied().collect::<BTreeSet<_>>() {
        fd_remap.add(fd);
    }

    let mut ranges: Vec<FdSelectRange> = Vec::new();
    for (new_gid, old_fd) in old_fds.iter().enumerate() {
        let fd = fd_remap.add(*old_fd);
        if ranges.last().map(|range| range.fd) != Some(fd) {
            ranges.push(FdSelectRange {
                first: new_gid as u32,
                fd,
            });
        }
    }

    let num_glyphs = glyphs.len() as u32;
    let format0_size = 1 + glyphs.len();
    // format, nRanges, ranges and the sentinel
    let format3_size = 1 + 2 + 3 * ranges.len() + 2;
    let (format, size_bytes) = if format0_size < format3_size {
        (0, format0_size)
    } else {
        (3, format3_size)
    };
    log::debug!(
        "FDSelect: {} glyphs, {} of {fd_count} FDs, {} ranges, format {format} ({size_bytes} bytes)",
        num_glyphs,
        fd_remap.len(),
        ranges.len()
    );
    Ok(FdSelectPlan {
        format,
        fd_count: fd_remap.len(),
        size_bytes,
        num_glyphs,
        ranges,
        fd_remap,
    })
}

/// Writes the planned FDSelect.
pub fn write_fdselect(s: &mut Serializer, plan: &FdSelectPlan) -> Result<(), SerializeErrorFlags> {
    s.embed(plan.format)?;
    match plan.format {
        0 => {
            for fd in plan.glyph_fds() {
                s.embed(fd as u8)?;
            }
        }
        3 => {
            s.embed(plan.ranges.len() as u16)?;
            for range in &plan.ranges {
                s.embed(range.first as u16)?;
                s.embed(range.fd as u8)?;
            }
            s.embed(plan.num_glyphs as u16)?;
        }
        _ => return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)),
    }
    Ok(())
}
