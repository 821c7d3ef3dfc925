//! Desubroutinization of charstrings.
//!
//! Each retained glyph is executed with [`Interpreter`] and every operator
//! it reports is written back out, so calls to local and global subroutines
//! are replaced by the code they run. The output needs no subroutines at
//! all, which is what allows the subset to drop its Subrs and to write an
//! empty global subroutine INDEX.

use font_types::GlyphId;

use crate::{
    buffer::CharstringBuffer,
    charstring::{CharstringVisitor, Interpreter},
    number::Number,
    opcode::{cs, OpCode},
    serialize::SerializeErrorFlags,
    source::CffSource,
    SubsetError, SubsetFlags,
};

/// Produces subroutine free charstrings for a set of glyphs.
#[derive(Copy, Clone, Default, Debug)]
pub struct SubrFlattener {
    drop_hints: bool,
    strict_int_range: bool,
}

impl SubrFlattener {
    pub fn new(flags: SubsetFlags) -> Self {
        Self {
            drop_hints: flags.drop_hints(),
            strict_int_range: flags.contains(SubsetFlags::SUBSET_FLAGS_STRICT_INT_RANGE),
        }
    }

    /// Flattens the charstring of every glyph in `glyphs`, in order.
    ///
    /// Fails on the first glyph that does not execute, reporting its id.
    pub fn flatten<'a, S: CffSource<'a> + ?Sized>(
        &self,
        acc: &S,
        glyphs: &[GlyphId],
    ) -> Result<Vec<Vec<u8>>, SubsetError> {
        glyphs
            .iter()
            .map(|&gid| self.flatten_glyph(acc, gid))
            .collect()
    }

    fn flatten_glyph<'a, S: CffSource<'a> + ?Sized>(
        &self,
        acc: &S,
        gid: GlyphId,
    ) -> Result<Vec<u8>, SubsetError> {
        let charstring = acc.charstring(gid)?;
        let fd = acc
            .fd_of(gid)
            .ok_or_else(|| SubsetError::InvalidFdSelect(format!("no FD for glyph {gid}")))?;
        let mut interpreter = Interpreter::new(acc.global_subrs(), acc.local_subrs(fd));
        let mut visitor = FlattenVisitor {
            buf: if self.strict_int_range {
                CharstringBuffer::with_strict_int_range()
            } else {
                CharstringBuffer::new()
            },
            drop_hints: self.drop_hints,
        };
        interpreter
            .run(charstring, &mut visitor)
            .map_err(|error| SubsetError::MalformedInput { gid, error })?;
        let flattened = visitor.buf.into_bytes()?;
        log::trace!(
            "flattened {gid}: {} -> {} bytes",
            charstring.len(),
            flattened.len()
        );
        Ok(flattened)
    }
}

struct FlattenVisitor {
    buf: CharstringBuffer,
    drop_hints: bool,
}

impl FlattenVisitor {
    fn emit(
        &mut self,
        width: Option<Number>,
        op: OpCode,
        operands: &[Number],
        mask: &[u8],
    ) -> Result<(), SerializeErrorFlags> {
        if let Some(width) = width {
            self.buf.append_number(width)?;
        }
        if self.drop_hints && cs::is_hint_op(op) {
            return Ok(());
        }
        for operand in operands {
            self.buf.append_number(*operand)?;
        }
        self.buf.append_op(op)?;
        self.buf.append_bytes(mask)
    }
}

impl CharstringVisitor for FlattenVisitor {
    fn visit(&mut self, width: Option<Number>, op: OpCode, operands: &[Number], mask: &[u8]) {
        // errors stay in the buffer and are reported by into_bytes
        if self.buf.in_error() {
            return;
        }
        let _ = self.emit(width, op, operands, mask);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        charstring::{tests::Recorder, CharstringError},
        source::CffAccelerator,
        test_font::{TestFd, TestFont},
    };

    fn font_with(charstrings: Vec<Vec<u8>>) -> TestFont {
        TestFont {
            charstrings,
            fds: vec![TestFd::default()],
            ..Default::default()
        }
    }

    fn flatten(font: &TestFont, flags: SubsetFlags) -> Result<Vec<Vec<u8>>, SubsetError> {
        let data = font.build();
        let acc = CffAccelerator::new(&data).unwrap();
        let glyphs = (0..font.charstrings.len() as u32)
            .map(GlyphId::new)
            .collect::<Vec<_>>();
        SubrFlattener::new(flags).flatten(&acc, &glyphs)
    }

    // 100 200 hstem 400 hmoveto endchar
    const HINTED: &[u8] = &[239, 247, 92, 1, 248, 36, 22, 14];

    #[test]
    fn drop_hints() {
        let font = font_with(vec![HINTED.to_vec()]);
        let flattened = flatten(&font, SubsetFlags::SUBSET_FLAGS_NO_HINTING).unwrap();
        assert_eq!(flattened, [vec![248, 36, 22, 14]]);
    }

    #[test]
    fn plain_charstrings_are_unchanged() {
        let font = font_with(vec![HINTED.to_vec(), vec![14]]);
        let flattened = flatten(&font, SubsetFlags::default()).unwrap();
        assert_eq!(flattened, [HINTED.to_vec(), vec![14]]);
    }

    #[test]
    fn width_survives_dropped_hints() {
        // 500 width, 10 20 hstem, 30 40 hintmask 0xC0, 100 hmoveto, endchar
        let charstring = vec![248, 136, 149, 159, 1, 169, 179, 19, 0xC0, 239, 22, 14];
        let font = font_with(vec![charstring]);
        let flattened = flatten(&font, SubsetFlags::SUBSET_FLAGS_NO_HINTING).unwrap();
        assert_eq!(flattened, [vec![248, 136, 239, 22, 14]]);
    }

    #[test]
    fn masks_are_kept_with_hints() {
        let charstring = vec![248, 136, 149, 159, 1, 169, 179, 19, 0xC0, 239, 22, 14];
        let font = font_with(vec![charstring.clone()]);
        let flattened = flatten(&font, SubsetFlags::default()).unwrap();
        assert_eq!(flattened, [charstring]);
    }

    fn subroutinized_font() -> TestFont {
        TestFont {
            // gsubr 0: 50 return
            global_subrs: vec![vec![189, 11]],
            charstrings: vec![
                // 10 (subr 1) rlineto, endchar via subr 0
                vec![149, 33, 10, 5, 32, 10],
                // 300 width, gsubr 0 supplies the hmoveto operand
                vec![247, 192, 32, 29, 22, 14],
            ],
            fds: vec![TestFd {
                private: vec![],
                subrs: vec![
                    // subr 0 (bias 107): endchar
                    vec![14],
                    // subr 1: 60 (gsubr 0) return
                    vec![199, 32, 29, 11],
                ],
            }],
            ..Default::default()
        }
    }

    fn record(charstring: &[u8], acc: &CffAccelerator, fd: u16) -> Recorder {
        let mut recorder = Recorder::default();
        Interpreter::new(acc.global_subrs(), acc.local_subrs(fd))
            .run(charstring, &mut recorder)
            .unwrap();
        recorder
    }

    #[test]
    fn subroutines_are_inlined() {
        let font = subroutinized_font();
        let data = font.build();
        let acc = CffAccelerator::new(&data).unwrap();
        let glyphs = [GlyphId::new(0), GlyphId::new(1)];
        let flattened = SubrFlattener::default().flatten(&acc, &glyphs).unwrap();
        assert_eq!(flattened[0], [149, 199, 189, 5, 14]);
        assert_eq!(flattened[1], [247, 192, 189, 22, 14]);
        for (gid, charstring) in glyphs.iter().zip(&flattened) {
            let original = record(acc.charstring(*gid).unwrap(), &acc, 0);
            let mut replayed = Recorder::default();
            Interpreter::new(Default::default(), None)
                .run(charstring, &mut replayed)
                .unwrap();
            assert_eq!(original.0, replayed.0);
        }
    }

    #[test]
    fn flattening_is_idempotent() {
        let once = flatten(&subroutinized_font(), SubsetFlags::default()).unwrap();
        let twice = flatten(&font_with(once.clone()), SubsetFlags::default()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_glyph_is_reported() {
        let font = font_with(vec![vec![14], vec![22]]);
        match flatten(&font, SubsetFlags::default()) {
            Err(SubsetError::MalformedInput { gid, error }) => {
                assert_eq!(gid, GlyphId::new(1));
                assert_eq!(error, CharstringError::StackUnderflow);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn missing_endchar_is_written() {
        let font = font_with(vec![vec![149, 22], vec![239]]);
        let flattened = flatten(&font, SubsetFlags::default()).unwrap();
        assert_eq!(flattened, [vec![149, 22, 14], vec![239, 14]]);
    }

    #[test]
    fn width_after_dotsection_survives_dropped_hints() {
        // dotsection 500 10 20 hstem 100 hmoveto endchar
        let font = font_with(vec![vec![12, 0, 248, 136, 149, 159, 1, 239, 22, 14]]);
        let flattened = flatten(&font, SubsetFlags::SUBSET_FLAGS_NO_HINTING).unwrap();
        assert_eq!(flattened, [vec![248, 136, 239, 22, 14]]);

        let mut replayed = Recorder::default();
        Interpreter::new(Default::default(), None)
            .run(&flattened[0], &mut replayed)
            .unwrap();
        assert_eq!(replayed.0[0].0, Some(Number::Int(500)));
    }

    #[test]
    fn nothing_is_written_after_an_error() {
        let mut buf = CharstringBuffer::with_strict_int_range();
        buf.append_int(139).unwrap();
        assert!(buf.append_int(40000).is_err());
        let mut visitor = FlattenVisitor {
            buf,
            drop_hints: false,
        };
        visitor.visit(None, cs::HMOVETO, &[Number::Int(10)], &[]);
        visitor.visit(Some(Number::Int(300)), cs::ENDCHAR, &[], &[]);
        assert_eq!(visitor.buf.len(), 2);
        assert_eq!(
            visitor.buf.into_bytes(),
            Err(SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW)
        );
    }

    #[test]
    fn glyph_outside_font() {
        let data = font_with(vec![vec![14]]).build();
        let acc = CffAccelerator::new(&data).unwrap();
        let result = SubrFlattener::default().flatten(&acc, &[GlyphId::new(5)]);
        assert!(matches!(result, Err(SubsetError::ReadError(_))));
    }
}
