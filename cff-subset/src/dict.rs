//! Splitting and rewriting of CFF DICTs.
//!
//! DICT data is kept as a list of [`OpStr`]s, each holding one operator with
//! its original operand bytes. Rewriting copies most of them verbatim and
//! only touches the entries that carry offsets or that become stale once
//! subroutines are flattened.
//!
//! Every offset operand is written in the five byte long integer form no
//! matter how small its value. That makes the size of a DICT independent of
//! where the tables it points to end up, so sizes can be computed before
//! any offset is known.

use crate::{
    offsets::{OffsetTable, TableInfo},
    opcode::{dict, OpCode, BCD, ESCAPE, LONG_INT_DICT, SHORT_INT},
    serialize::{SerializeErrorFlags, Serializer},
    SubsetError,
};

/// Size of an offset operand in long integer form.
pub const LONG_INT_DICT_SIZE: usize = 5;

/// Size of a rewritten Private operator: size and offset operands followed
/// by the operator byte.
pub const PRIVATE_OP_SIZE: usize = LONG_INT_DICT_SIZE * 2 + 1;

/// A DICT operator together with the bytes of its operands and the
/// operator itself, exactly as they appear in the source font.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct OpStr<'a> {
    pub op: OpCode,
    pub bytes: &'a [u8],
}

impl<'a> OpStr<'a> {
    pub fn new(op: OpCode, bytes: &'a [u8]) -> Self {
        Self { op, bytes }
    }

    /// Returns the operand bytes, without the trailing operator.
    pub fn operands(&self) -> &'a [u8] {
        &self.bytes[..self.bytes.len().saturating_sub(self.op.size())]
    }
}

/// Errors that occur while splitting DICT data.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DictError {
    #[error("DICT operand truncated at byte {0}")]
    Truncated(usize),
    #[error("reserved byte {byte} in DICT at byte {offset}")]
    Reserved { byte: u8, offset: usize },
    #[error("DICT data ends with operands that have no operator")]
    MissingOperator,
}

/// Splits DICT data into its operator strings.
pub fn parse_dict(data: &[u8]) -> Result<Vec<OpStr<'_>>, DictError> {
    let mut ops = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    while let Some(&b0) = data.get(pos) {
        let len = match b0 {
            0..=27 => {
                let (op, len) =
                    OpCode::read(b0, &data[pos + 1..]).ok_or(DictError::Truncated(pos))?;
                pos += len;
                ops.push(OpStr::new(op, &data[start..pos]));
                start = pos;
                continue;
            }
            SHORT_INT => 3,
            LONG_INT_DICT => 5,
            BCD => bcd_len(&data[pos..]).ok_or(DictError::Truncated(pos))?,
            32..=246 => 1,
            247..=254 => 2,
            31 | 255 => return Err(DictError::Reserved { byte: b0, offset: pos }),
        };
        if pos + len > data.len() {
            return Err(DictError::Truncated(pos));
        }
        pos += len;
    }
    if start != data.len() {
        return Err(DictError::MissingOperator);
    }
    Ok(ops)
}

/// Length of a binary coded decimal operand, including the leading `30`.
///
/// The number ends with the first byte that contains an `0xf` nibble.
fn bcd_len(data: &[u8]) -> Option<usize> {
    data.iter()
        .skip(1)
        .position(|byte| byte >> 4 == 0xF || byte & 0xF == 0xF)
        .map(|ix| ix + 2)
}

/// Returns true for Private DICT operators that only matter for hinting.
pub fn is_hint_op(op: OpCode) -> bool {
    matches!(
        op,
        dict::BLUE_VALUES
            | dict::OTHER_BLUES
            | dict::FAMILY_BLUES
            | dict::FAMILY_OTHER_BLUES
            | dict::STEM_SNAP_H
            | dict::STEM_SNAP_V
            | dict::STD_HW
            | dict::STD_VW
            | dict::BLUE_SCALE
            | dict::BLUE_SHIFT
            | dict::BLUE_FUZZ
            | dict::FORCE_BOLD
            | dict::LANGUAGE_GROUP
            | dict::EXPANSION_FACTOR
    )
}

/// Returns true for operators whose operands are offsets to other tables.
pub fn is_offset_op(op: OpCode) -> bool {
    matches!(
        op,
        dict::CHAR_STRINGS | dict::FD_ARRAY | dict::FD_SELECT | dict::PRIVATE | dict::SUBRS
    )
}

/// Rewrites the operator strings of one kind of DICT.
///
/// Implementations must append exactly [`serialized_size`] bytes from
/// [`serialize`]; layout of everything following the DICT depends on it.
///
/// [`serialized_size`]: DictOpSerializer::serialized_size
/// [`serialize`]: DictOpSerializer::serialize
pub trait DictOpSerializer {
    /// Extra state needed to rewrite offsets.
    type Context: ?Sized;

    fn serialized_size(&self, opstr: &OpStr, ctx: &Self::Context) -> usize;

    fn serialize(
        &self,
        s: &mut Serializer,
        opstr: &OpStr,
        ctx: &Self::Context,
    ) -> Result<(), SerializeErrorFlags>;

    /// Total size of the rewritten DICT.
    fn dict_size(&self, ops: &[OpStr], ctx: &Self::Context) -> usize {
        ops.iter().map(|op| self.serialized_size(op, ctx)).sum()
    }

    /// Writes the whole DICT, checking each entry against its computed size.
    fn serialize_dict(
        &self,
        s: &mut Serializer,
        ops: &[OpStr],
        ctx: &Self::Context,
    ) -> Result<(), SubsetError> {
        for opstr in ops {
            let expected = self.serialized_size(opstr, ctx);
            let start = s.length();
            self.serialize(s, opstr, ctx)?;
            let actual = s.length() - start;
            if actual != expected {
                log::error!(
                    "DICT operator {:?} wrote {actual} bytes, expected {expected}",
                    opstr.op
                );
                return Err(SubsetError::InconsistentSize { expected, actual });
            }
        }
        Ok(())
    }
}

/// Top DICT rewriter: points CharStrings, FDArray and FDSelect at their
/// new locations.
///
/// A Private operator, which only appears in Top DICTs of fonts that are
/// not CID-keyed, is rewritten like the one in a Font DICT using the first
/// entry of [`OffsetTable::private_dicts`].
#[derive(Copy, Clone, Default, Debug)]
pub struct TopDictSerializer;

impl DictOpSerializer for TopDictSerializer {
    type Context = OffsetTable;

    fn serialized_size(&self, opstr: &OpStr, _offsets: &OffsetTable) -> usize {
        match opstr.op {
            dict::CHAR_STRINGS | dict::FD_ARRAY | dict::FD_SELECT => {
                LONG_INT_DICT_SIZE + opstr.op.size()
            }
            dict::PRIVATE => PRIVATE_OP_SIZE,
            _ => opstr.bytes.len(),
        }
    }

    fn serialize(
        &self,
        s: &mut Serializer,
        opstr: &OpStr,
        offsets: &OffsetTable,
    ) -> Result<(), SerializeErrorFlags> {
        match opstr.op {
            dict::CHAR_STRINGS => serialize_offset4_op(s, opstr.op, offsets.char_strings.offset),
            dict::FD_ARRAY => serialize_offset4_op(s, opstr.op, offsets.fd_array.offset),
            dict::FD_SELECT => serialize_offset4_op(s, opstr.op, offsets.fd_select.offset),
            // only present in fonts without an FDArray
            dict::PRIVATE => {
                let private = offsets
                    .private_dicts
                    .first()
                    .ok_or(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)?;
                serialize_private_op(s, private)
            }
            _ => copy_opstr(s, opstr),
        }
    }
}

/// Font DICT rewriter: replaces the Private operator's size and offset.
#[derive(Copy, Clone, Default, Debug)]
pub struct FontDictSerializer;

impl DictOpSerializer for FontDictSerializer {
    /// Location of this Font DICT's Private DICT.
    type Context = TableInfo;

    fn serialized_size(&self, opstr: &OpStr, _private: &TableInfo) -> usize {
        if opstr.op == dict::PRIVATE {
            PRIVATE_OP_SIZE
        } else {
            opstr.bytes.len()
        }
    }

    fn serialize(
        &self,
        s: &mut Serializer,
        opstr: &OpStr,
        private: &TableInfo,
    ) -> Result<(), SerializeErrorFlags> {
        if opstr.op == dict::PRIVATE {
            serialize_private_op(s, private)
        } else {
            copy_opstr(s, opstr)
        }
    }
}

/// Private DICT rewriter: removes the local Subrs reference and, when
/// hints are dropped, the hinting parameters.
#[derive(Copy, Clone, Default, Debug)]
pub struct PrivateDictSerializer {
    drop_hints: bool,
}

impl PrivateDictSerializer {
    pub fn new(drop_hints: bool) -> Self {
        Self { drop_hints }
    }

    fn drops(&self, op: OpCode) -> bool {
        op == dict::SUBRS || (self.drop_hints && is_hint_op(op))
    }
}

impl DictOpSerializer for PrivateDictSerializer {
    type Context = ();

    fn serialized_size(&self, opstr: &OpStr, _: &()) -> usize {
        if self.drops(opstr.op) {
            0
        } else {
            opstr.bytes.len()
        }
    }

    fn serialize(&self, s: &mut Serializer, opstr: &OpStr, _: &()) -> Result<(), SerializeErrorFlags> {
        if self.drops(opstr.op) {
            Ok(())
        } else {
            copy_opstr(s, opstr)
        }
    }
}

fn copy_opstr(s: &mut Serializer, opstr: &OpStr) -> Result<(), SerializeErrorFlags> {
    s.embed_bytes(opstr.bytes).map(|_| ())
}

fn serialize_int4(s: &mut Serializer, value: u32) -> Result<(), SerializeErrorFlags> {
    s.embed(LONG_INT_DICT)?;
    s.embed(value)?;
    Ok(())
}

fn serialize_private_op(s: &mut Serializer, private: &TableInfo) -> Result<(), SerializeErrorFlags> {
    serialize_int4(s, private.size)?;
    serialize_offset4_op(s, dict::PRIVATE, private.offset)
}

fn serialize_offset4_op(s: &mut Serializer, op: OpCode, value: u32) -> Result<(), SerializeErrorFlags> {
    serialize_int4(s, value)?;
    serialize_op(s, op)
}

pub(crate) fn serialize_op(s: &mut Serializer, op: OpCode) -> Result<(), SerializeErrorFlags> {
    if op.is_escaped() {
        s.embed(ESCAPE)?;
    }
    s.embed(op.unescape())?;
    Ok(())
}
