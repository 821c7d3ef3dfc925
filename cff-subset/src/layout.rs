//! Sizing, placement and emission of a subset CFF table.
//!
//! [`CffSubsetLayout`] drives the other components in a fixed order:
//! FDSelect planning, charstring flattening and a size pass at
//! [`plan`](CffSubsetLayout::plan), offset assignment at
//! [`assign_offsets`](CffSubsetLayout::assign_offsets) and the emit pass at
//! [`serialize`](CffSubsetLayout::serialize).
//!
//! The layout owns everything from the FDSelect onwards. The caller writes
//! the header, Name INDEX, Top DICT INDEX, String INDEX, global subroutine
//! INDEX and charset, places them before the base offset and embeds the
//! returned Top DICT in its INDEX. Flattened charstrings call no
//! subroutines, so the global subroutine INDEX can be left empty.

use font_types::GlyphId;

use crate::{
    dict::{DictOpSerializer, FontDictSerializer, OpStr, PrivateDictSerializer, TopDictSerializer},
    fdselect::{plan_fdselect, write_fdselect, FdSelectPlan},
    flatten::SubrFlattener,
    index::{index_size, write_index, write_index_header},
    offsets::{LayoutCursor, OffsetTable, TableInfo},
    serialize::{SerializeErrorFlags, Serializer},
    source::CffSource,
    SubsetError, SubsetFlags,
};

/// Output of [`CffSubsetLayout::serialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedCff {
    /// The rewritten Top DICT.
    pub top_dict: Vec<u8>,
    /// FDSelect, CharStrings INDEX, FDArray INDEX and Private DICTs, in
    /// that order, to be written at the base offset.
    pub tail: Vec<u8>,
}

#[derive(Clone, Default, Debug)]
struct SectionSizes {
    top_dict: usize,
    fd_select: usize,
    char_strings: usize,
    fd_array: usize,
    font_dicts: Vec<usize>,
    private_dicts: Vec<usize>,
}

/// Plan for one subset CFF table.
pub struct CffSubsetLayout<'a> {
    is_cid: bool,
    drop_hints: bool,
    top_dict_ops: Vec<OpStr<'a>>,
    /// Font and Private DICTs of the retained FDs, in new FD order.
    font_dicts: Vec<Vec<OpStr<'a>>>,
    private_dicts: Vec<Vec<OpStr<'a>>>,
    charstrings: Vec<Vec<u8>>,
    fd_select: FdSelectPlan,
    sizes: SectionSizes,
    offsets: Option<OffsetTable>,
}

impl<'a> CffSubsetLayout<'a> {
    /// Plans the subset holding `glyphs`, where `glyphs[i]` becomes new
    /// glyph `i`.
    pub fn plan<S: CffSource<'a> + ?Sized>(
        acc: &S,
        glyphs: &[GlyphId],
        flags: SubsetFlags,
    ) -> Result<Self, SubsetError> {
        let fd_select = plan_fdselect(glyphs, acc.fd_count(), acc)?;
        let charstrings = SubrFlattener::new(flags).flatten(acc, glyphs)?;

        let is_cid = acc.is_cid();
        // the Top DICT of a font without an FDArray always needs its Private DICT
        let old_fds = if is_cid {
            fd_select.fd_remap.old_fds().collect::<Vec<_>>()
        } else {
            vec![0]
        };
        let font_dicts = old_fds
            .iter()
            .map(|fd| acc.font_dict_ops(*fd).to_vec())
            .collect::<Vec<_>>();
        let private_dicts = old_fds
            .iter()
            .map(|fd| acc.private_dict_ops(*fd).to_vec())
            .collect::<Vec<_>>();

        let mut layout = Self {
            is_cid,
            drop_hints: flags.drop_hints(),
            top_dict_ops: acc.top_dict_ops().to_vec(),
            font_dicts,
            private_dicts,
            charstrings,
            fd_select,
            sizes: SectionSizes::default(),
            offsets: None,
        };
        layout.sizes = layout.compute_sizes();
        log::debug!("planned CFF subset sizes: {:?}", layout.sizes);
        Ok(layout)
    }

    fn compute_sizes(&self) -> SectionSizes {
        // offset operands are written at full width, so placeholders give
        // the final sizes
        let top_dict = TopDictSerializer.dict_size(&self.top_dict_ops, &OffsetTable::default());
        let font_dicts = self
            .font_dicts
            .iter()
            .map(|ops| FontDictSerializer.dict_size(ops, &TableInfo::default()))
            .collect::<Vec<_>>();
        let private_serializer = self.private_dict_serializer();
        let private_dicts = self
            .private_dicts
            .iter()
            .map(|ops| private_serializer.dict_size(ops, &()))
            .collect();
        let charstring_sizes = self.charstrings.iter().map(Vec::len).collect::<Vec<_>>();
        let (fd_select, fd_array) = if self.is_cid {
            (self.fd_select.size_bytes, index_size(&font_dicts))
        } else {
            (0, 0)
        };
        SectionSizes {
            top_dict,
            fd_select,
            char_strings: index_size(&charstring_sizes),
            fd_array,
            font_dicts,
            private_dicts,
        }
    }

    fn private_dict_serializer(&self) -> PrivateDictSerializer {
        PrivateDictSerializer::new(self.drop_hints)
    }

    /// Size of the rewritten Top DICT, needed by the caller to lay out the
    /// Top DICT INDEX before any offset is known.
    pub fn top_dict_size(&self) -> usize {
        self.sizes.top_dict
    }

    pub fn fd_select_plan(&self) -> &FdSelectPlan {
        &self.fd_select
    }

    pub fn charstrings(&self) -> &[Vec<u8>] {
        &self.charstrings
    }

    /// Places every owned table contiguously starting at `base`, which is
    /// relative to the start of the CFF table.
    pub fn assign_offsets(&mut self, base: u32) -> Result<&OffsetTable, SubsetError> {
        let mut cursor = LayoutCursor::new(base);
        let fd_select = cursor.place(self.sizes.fd_select)?;
        let char_strings = cursor.place(self.sizes.char_strings)?;
        let fd_array = cursor.place(self.sizes.fd_array)?;
        let private_dicts_offset = cursor.position();
        let mut private_dicts = Vec::with_capacity(self.sizes.private_dicts.len());
        let mut local_subrs = Vec::with_capacity(self.sizes.private_dicts.len());
        for size in &self.sizes.private_dicts {
            let private = cursor.place(*size)?;
            private_dicts.push(private);
            // no local subroutines are written
            local_subrs.push(TableInfo {
                offset: private.offset + private.size,
                size: 0,
            });
        }
        log::debug!(
            "CFF subset tables span {base}..{} ({} Private DICTs)",
            cursor.position(),
            private_dicts.len()
        );
        Ok(&*self.offsets.insert(OffsetTable {
            top_dict: TableInfo {
                offset: 0,
                size: self.sizes.top_dict as u32,
            },
            fd_select,
            fd_array,
            char_strings,
            global_subrs: TableInfo {
                offset: 0,
                size: index_size(&[]) as u32,
            },
            private_dicts_offset,
            private_dicts,
            local_subrs,
        }))
    }

    /// Offsets assigned by the last call to
    /// [`assign_offsets`](Self::assign_offsets).
    pub fn offsets(&self) -> Option<&OffsetTable> {
        self.offsets.as_ref()
    }

    /// Writes the Top DICT and the table tail.
    ///
    /// Every section is checked against the size computed when planning.
    pub fn serialize(&self) -> Result<SerializedCff, SubsetError> {
        let offsets = self
            .offsets
            .as_ref()
            .ok_or(SubsetError::OutOfMemory(SerializeErrorFlags::SERIALIZE_ERROR_OTHER))?;

        let mut s = Serializer::new(self.sizes.top_dict as u32);
        TopDictSerializer.serialize_dict(&mut s, &self.top_dict_ops, offsets)?;
        check_size("Top DICT", self.sizes.top_dict, s.length())?;
        let top_dict = s.copy_bytes()?;

        let base = offsets.fd_select.offset;
        let end = offsets
            .private_dicts
            .last()
            .map(TableInfo::end)
            .unwrap_or(offsets.fd_array.end());
        let mut s = Serializer::new((end - base as u64) as u32);

        let start = s.length();
        if self.is_cid {
            write_fdselect(&mut s, &self.fd_select)?;
        }
        check_size("FDSelect", self.sizes.fd_select, s.length() - start)?;

        let start = s.length();
        write_index(&mut s, &self.charstrings)?;
        check_size("CharStrings", self.sizes.char_strings, s.length() - start)?;

        let start = s.length();
        if self.is_cid {
            write_index_header(&mut s, &self.sizes.font_dicts)?;
            for (ops, private) in self.font_dicts.iter().zip(&offsets.private_dicts) {
                FontDictSerializer.serialize_dict(&mut s, ops, private)?;
            }
        }
        check_size("FDArray", self.sizes.fd_array, s.length() - start)?;

        let private_serializer = self.private_dict_serializer();
        for (ops, private) in self.private_dicts.iter().zip(&offsets.private_dicts) {
            let start = s.length();
            private_serializer.serialize_dict(&mut s, ops, &())?;
            check_size("Private DICT", private.size as usize, s.length() - start)?;
        }

        let tail = s.copy_bytes()?;
        log::debug!(
            "serialized CFF subset: {} byte Top DICT, {} byte tail",
            top_dict.len(),
            tail.len()
        );
        Ok(SerializedCff { top_dict, tail })
    }
}

fn check_size(section: &str, expected: usize, actual: usize) -> Result<(), SubsetError> {
    if expected != actual {
        log::error!("{section} wrote {actual} bytes, expected {expected}");
        return Err(SubsetError::InconsistentSize { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        fdselect::FdSelectSource,
        opcode::{dict, OpCode},
        source::CffAccelerator,
        test_font::{index_bytes, TestFd, TestFont},
    };

    /// Subsets `font` and assembles a complete table around the result.
    fn subset(font: &TestFont, glyphs: &[u32], flags: SubsetFlags) -> Vec<u8> {
        let data = font.build();
        let acc = CffAccelerator::new(&data).unwrap();
        let glyphs = glyphs.iter().copied().map(GlyphId::new).collect::<Vec<_>>();
        let mut layout = CffSubsetLayout::plan(&acc, &glyphs, flags).unwrap();

        let name = index_bytes(&[b"Test"]);
        let global_subrs = index_bytes(&[[11u8]]);
        let base = 4
            + name.len() * 2
            + index_size(&[layout.top_dict_size()])
            + global_subrs.len();
        layout.assign_offsets(base as u32).unwrap();
        let serialized = layout.serialize().unwrap();

        let mut table = vec![1, 0, 4, 4];
        table.extend(&name);
        table.extend(index_bytes(&[&serialized.top_dict]));
        table.extend(&name);
        table.extend(&global_subrs);
        assert_eq!(table.len(), base);
        table.extend(serialized.tail);
        table
    }

    fn ops(ops: &[OpStr]) -> Vec<OpCode> {
        ops.iter().map(|op| op.op).collect()
    }

    fn cid_font() -> TestFont {
        TestFont {
            global_subrs: vec![vec![189, 11]],
            charstrings: vec![
                vec![14],
                // 60 hmoveto via local subr 0
                vec![32, 10, 22, 14],
                // 100 width, 70 50 rmoveto via local subr 0 and gsubr 0
                vec![239, 32, 10, 32, 29, 21, 14],
                vec![139, 22, 14],
            ],
            fds: vec![
                TestFd {
                    private: vec![248, 136, 21],
                    subrs: vec![],
                },
                TestFd {
                    private: vec![],
                    subrs: vec![vec![199, 11]],
                },
                TestFd {
                    // -20 0 BlueValues, 50 StdHW, 200 nominalWidthX
                    private: vec![119, 139, 6, 189, 10, 247, 92, 21],
                    subrs: vec![vec![209, 11]],
                },
            ],
            fd_select: Some(vec![0, 1, 2, 0]),
        }
    }

    #[test]
    fn cid_subset() {
        let table = subset(&cid_font(), &[3, 2], SubsetFlags::default());
        let acc = CffAccelerator::new(&table).unwrap();
        assert!(acc.is_cid());
        assert_eq!(acc.num_glyphs(), 2);
        assert_eq!(acc.fd_count(), 2);
        assert_eq!(acc.fd_of(GlyphId::new(0)), Some(0));
        assert_eq!(acc.fd_of(GlyphId::new(1)), Some(1));
        assert_eq!(acc.charstring(GlyphId::new(0)).unwrap(), [139, 22, 14]);
        assert_eq!(acc.charstring(GlyphId::new(1)).unwrap(), [239, 209, 189, 21, 14]);
        assert!(acc.local_subrs(0).is_none());
        assert!(acc.local_subrs(1).is_none());
        assert_eq!(ops(acc.private_dict_ops(0)), [dict::NOMINAL_WIDTH_X]);
        assert_eq!(
            ops(acc.private_dict_ops(1)),
            [dict::BLUE_VALUES, dict::STD_HW, dict::NOMINAL_WIDTH_X]
        );
        assert_eq!(acc.private_dict_ops(1)[2].bytes, [247, 92, 21]);
    }

    #[test]
    fn drop_hints_from_private_dicts() {
        let table = subset(&cid_font(), &[2], SubsetFlags::SUBSET_FLAGS_NO_HINTING);
        let acc = CffAccelerator::new(&table).unwrap();
        assert_eq!(acc.fd_count(), 1);
        assert_eq!(ops(acc.private_dict_ops(0)), [dict::NOMINAL_WIDTH_X]);
    }

    #[test]
    fn non_cid_subset() {
        let font = TestFont {
            charstrings: vec![vec![14], vec![32, 10, 22, 14], vec![139, 139, 21, 14]],
            fds: vec![TestFd {
                private: vec![248, 136, 21],
                subrs: vec![vec![199, 11]],
            }],
            ..Default::default()
        };
        let table = subset(&font, &[0, 1], SubsetFlags::default());
        let acc = CffAccelerator::new(&table).unwrap();
        assert!(!acc.is_cid());
        assert_eq!(acc.num_glyphs(), 2);
        assert_eq!(acc.charstring(GlyphId::new(1)).unwrap(), [199, 22, 14]);
        assert_eq!(ops(acc.private_dict_ops(0)), [dict::NOMINAL_WIDTH_X]);
        assert!(acc.local_subrs(0).is_none());
        assert_eq!(
            ops(acc.top_dict_ops()),
            [dict::VERSION, dict::CHAR_STRINGS, dict::PRIVATE]
        );
    }

    #[test]
    fn non_cid_empty_subset_keeps_private_dict() {
        let font = TestFont {
            charstrings: vec![vec![14]],
            fds: vec![TestFd {
                private: vec![248, 136, 21],
                subrs: vec![],
            }],
            ..Default::default()
        };
        let data = font.build();
        let acc = CffAccelerator::new(&data).unwrap();
        let mut layout = CffSubsetLayout::plan(&acc, &[], SubsetFlags::default()).unwrap();
        let offsets = layout.assign_offsets(50).unwrap();
        assert_eq!(offsets.private_dicts.len(), 1);
        let serialized = layout.serialize().unwrap();
        // empty CharStrings INDEX followed by the Private DICT
        assert_eq!(serialized.tail, [0, 0, 248, 136, 21]);
    }

    #[test]
    fn tables_are_contiguous() {
        let data = cid_font().build();
        let acc = CffAccelerator::new(&data).unwrap();
        let glyphs = [0, 2, 3].map(GlyphId::new);
        let mut layout = CffSubsetLayout::plan(&acc, &glyphs, SubsetFlags::default()).unwrap();
        assert_eq!(layout.fd_select_plan().fd_count, 2);
        assert_eq!(layout.charstrings().len(), 3);
        let offsets = layout.assign_offsets(1000).unwrap().clone();
        assert_eq!(offsets.fd_select.offset, 1000);
        assert_eq!(offsets.char_strings.offset as u64, offsets.fd_select.end());
        assert_eq!(offsets.fd_array.offset as u64, offsets.char_strings.end());
        assert_eq!(offsets.private_dicts_offset as u64, offsets.fd_array.end());
        assert_eq!(offsets.private_dicts[0].offset, offsets.private_dicts_offset);
        assert_eq!(
            offsets.private_dicts[1].offset as u64,
            offsets.private_dicts[0].end()
        );
        assert_eq!(offsets.local_subrs.len(), 2);
        assert!(offsets.local_subrs.iter().all(|subrs| subrs.size == 0));
        assert_eq!(offsets.top_dict.size as usize, layout.top_dict_size());

        let serialized = layout.serialize().unwrap();
        assert_eq!(serialized.top_dict.len(), layout.top_dict_size());
        assert_eq!(
            serialized.tail.len() as u64,
            offsets.private_dicts[1].end() - 1000
        );
    }

    #[test]
    fn serialize_requires_offsets() {
        let data = cid_font().build();
        let acc = CffAccelerator::new(&data).unwrap();
        let layout = CffSubsetLayout::plan(&acc, &[GlyphId::new(0)], SubsetFlags::default()).unwrap();
        assert!(layout.offsets().is_none());
        assert!(layout.serialize().is_err());
    }

    #[test]
    fn offset_overflow() {
        let data = cid_font().build();
        let acc = CffAccelerator::new(&data).unwrap();
        let mut layout = CffSubsetLayout::plan(&acc, &[GlyphId::new(0)], SubsetFlags::default()).unwrap();
        assert!(matches!(
            layout.assign_offsets(u32::MAX - 8),
            Err(SubsetError::OffsetOverflow(_))
        ));
    }

    #[test]
    fn malformed_glyph_fails_plan() {
        let mut font = cid_font();
        // callsubr in an FD without local subroutines
        font.charstrings[0] = vec![139, 10, 14];
        let data = font.build();
        let acc = CffAccelerator::new(&data).unwrap();
        let result = CffSubsetLayout::plan(&acc, &[GlyphId::new(0)], SubsetFlags::default());
        assert!(matches!(
            result,
            Err(SubsetError::MalformedInput { gid, .. }) if gid == GlyphId::new(0)
        ));
    }
}
