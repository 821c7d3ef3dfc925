//! Access to the parts of a source CFF table that subsetting reads.

use std::ops::Range;

use font_types::GlyphId;
use read_fonts::{
    tables::{
        cff::Cff,
        postscript::{dict as ps_dict, Error, FdSelect, Index},
    },
    FontData, FontRead, FontRef, ReadError, TableProvider,
};

use crate::{
    dict::{parse_dict, OpStr},
    fdselect::FdSelectSource,
    SubsetError,
};

/// Everything the subsetter needs from a source font.
///
/// FD numbers used here are the ones of the source font. Fonts that are not
/// CID-keyed expose a single FD, numbered 0, whose Font DICT is empty and
/// whose Private DICT is the one referenced from the Top DICT.
pub trait CffSource<'a>: FdSelectSource {
    fn num_glyphs(&self) -> u32;

    fn charstring(&self, gid: GlyphId) -> Result<&'a [u8], SubsetError>;

    fn fd_count(&self) -> usize;

    fn is_cid(&self) -> bool;

    fn global_subrs(&self) -> Index<'a>;

    /// Local subroutines of an FD, if its Private DICT has any.
    fn local_subrs(&self, fd: u16) -> Option<Index<'a>>;

    fn top_dict_ops(&self) -> &[OpStr<'a>];

    fn font_dict_ops(&self, fd: u16) -> &[OpStr<'a>];

    fn private_dict_ops(&self, fd: u16) -> &[OpStr<'a>];
}

#[derive(Clone, Default)]
struct Subfont<'a> {
    font_dict_ops: Vec<OpStr<'a>>,
    private_dict_ops: Vec<OpStr<'a>>,
    local_subrs: Option<Index<'a>>,
}

/// Parsed view of a CFF table, built once per subset operation.
#[derive(Clone)]
pub struct CffAccelerator<'a> {
    top_dict_ops: Vec<OpStr<'a>>,
    charstrings: Index<'a>,
    global_subrs: Index<'a>,
    fd_select: Option<FdSelect<'a>>,
    subfonts: Vec<Subfont<'a>>,
    is_cid: bool,
}

impl<'a> CffAccelerator<'a> {
    /// Parses the raw data of a `CFF ` table.
    pub fn new(data: &'a [u8]) -> Result<Self, SubsetError> {
        let cff = Cff::read(FontData::new(data)).map_err(read_error)?;
        Self::from_cff(&cff)
    }

    pub fn from_font(font: &FontRef<'a>) -> Result<Self, SubsetError> {
        let cff = font.cff().map_err(read_error)?;
        Self::from_cff(&cff)
    }

    pub fn from_cff(cff: &Cff<'a>) -> Result<Self, SubsetError> {
        let table_data = cff.offset_data().as_bytes();
        // only one font per table in OpenType
        let top_dict_data = cff.top_dicts().get(0).map_err(SubsetError::ReadError)?;
        let top_dict_ops = parse_dict(top_dict_data)?;

        let mut charstrings = None;
        let mut font_dicts = None;
        let mut fd_select = None;
        let mut private_dict_range = None;
        for entry in ps_dict::entries(top_dict_data, None) {
            match entry.map_err(SubsetError::ReadError)? {
                ps_dict::Entry::CharstringsOffset(offset) => {
                    charstrings = Some(read_index(table_data, offset)?);
                }
                ps_dict::Entry::FdArrayOffset(offset) => {
                    font_dicts = Some(read_index(table_data, offset)?);
                }
                ps_dict::Entry::FdSelectOffset(offset) => {
                    fd_select = Some(
                        FdSelect::read(FontData::new(
                            table_data.get(offset..).unwrap_or_default(),
                        ))
                        .map_err(read_error)?,
                    );
                }
                ps_dict::Entry::PrivateDictRange(range) => private_dict_range = Some(range),
                _ => {}
            }
        }
        let charstrings = charstrings.ok_or_else(|| malformed("missing CharStrings"))?;

        let is_cid = font_dicts.is_some();
        let subfonts = if let Some(font_dicts) = font_dicts {
            if fd_select.is_none() {
                return Err(malformed("FDArray without FDSelect"));
            }
            (0..font_dicts.count() as usize)
                .map(|ix| {
                    let font_dict_data = font_dicts.get(ix).map_err(SubsetError::ReadError)?;
                    Subfont::from_font_dict(table_data, font_dict_data)
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let range = private_dict_range.ok_or(SubsetError::ReadError(Error::MissingPrivateDict))?;
            vec![Subfont::with_private_dict(table_data, Vec::new(), range)?]
        };
        log::debug!(
            "parsed CFF with {} glyphs and {} subfonts",
            charstrings.count(),
            subfonts.len()
        );

        Ok(Self {
            top_dict_ops,
            charstrings,
            global_subrs: cff.global_subrs().into(),
            fd_select: fd_select.filter(|_| is_cid),
            subfonts,
            is_cid,
        })
    }

    fn subfont(&self, fd: u16) -> Option<&Subfont<'a>> {
        self.subfonts.get(fd as usize)
    }
}

impl<'a> Subfont<'a> {
    fn from_font_dict(table_data: &'a [u8], font_dict_data: &'a [u8]) -> Result<Self, SubsetError> {
        let font_dict_ops = parse_dict(font_dict_data)?;
        let mut range = None;
        for entry in ps_dict::entries(font_dict_data, None) {
            if let ps_dict::Entry::PrivateDictRange(r) = entry.map_err(SubsetError::ReadError)? {
                range = Some(r);
            }
        }
        let range = range.ok_or(SubsetError::ReadError(Error::MissingPrivateDict))?;
        Self::with_private_dict(table_data, font_dict_ops, range)
    }

    fn with_private_dict(
        table_data: &'a [u8],
        font_dict_ops: Vec<OpStr<'a>>,
        range: Range<usize>,
    ) -> Result<Self, SubsetError> {
        let private_dict_data = table_data
            .get(range.clone())
            .ok_or_else(|| read_error(ReadError::OutOfBounds))?;
        let private_dict_ops = parse_dict(private_dict_data)?;
        let mut local_subrs = None;
        for entry in ps_dict::entries(private_dict_data, None) {
            // Subrs offset is relative to the Private DICT
            if let ps_dict::Entry::SubrsOffset(offset) = entry.map_err(SubsetError::ReadError)? {
                let offset = range
                    .start
                    .checked_add(offset)
                    .ok_or_else(|| read_error(ReadError::OutOfBounds))?;
                local_subrs = Some(read_index(table_data, offset)?);
            }
        }
        Ok(Self {
            font_dict_ops,
            private_dict_ops,
            local_subrs,
        })
    }
}

fn read_index(table_data: &[u8], offset: usize) -> Result<Index<'_>, SubsetError> {
    Index::new(table_data.get(offset..).unwrap_or_default(), false).map_err(SubsetError::ReadError)
}

fn read_error(error: ReadError) -> SubsetError {
    SubsetError::ReadError(error.into())
}

fn malformed(message: &'static str) -> SubsetError {
    read_error(ReadError::MalformedData(message))
}

impl FdSelectSource for CffAccelerator<'_> {
    fn fd_of(&self, gid: GlyphId) -> Option<u16> {
        if gid.to_u32() >= self.num_glyphs() {
            return None;
        }
        match &self.fd_select {
            Some(fd_select) => fd_select.fd_of(gid),
            None => Some(0),
        }
    }
}

impl<'a> CffSource<'a> for CffAccelerator<'a> {
    fn num_glyphs(&self) -> u32 {
        self.charstrings.count()
    }

    fn charstring(&self, gid: GlyphId) -> Result<&'a [u8], SubsetError> {
        self.charstrings
            .get(gid.to_u32() as usize)
            .map_err(SubsetError::ReadError)
    }

    fn fd_count(&self) -> usize {
        self.subfonts.len()
    }

    fn is_cid(&self) -> bool {
        self.is_cid
    }

    fn global_subrs(&self) -> Index<'a> {
        self.global_subrs.clone()
    }

    fn local_subrs(&self, fd: u16) -> Option<Index<'a>> {
        self.subfont(fd)?.local_subrs.clone()
    }

    fn top_dict_ops(&self) -> &[OpStr<'a>] {
        &self.top_dict_ops
    }

    fn font_dict_ops(&self, fd: u16) -> &[OpStr<'a>] {
        self.subfont(fd)
            .map(|subfont| subfont.font_dict_ops.as_slice())
            .unwrap_or_default()
    }

    fn private_dict_ops(&self, fd: u16) -> &[OpStr<'a>] {
        self.subfont(fd)
            .map(|subfont| subfont.private_dict_ops.as_slice())
            .unwrap_or_default()
    }
}
