//! Builds small CFF tables for tests.

use crate::{
    index::{index_size, write_index},
    opcode::LONG_INT_DICT,
    serialize::Serializer,
};

/// One Font DICT with its Private DICT.
#[derive(Clone, Default, Debug)]
pub(crate) struct TestFd {
    /// Private DICT data, without any Subrs entry.
    pub private: Vec<u8>,
    pub subrs: Vec<Vec<u8>>,
}

#[derive(Clone, Default, Debug)]
pub(crate) struct TestFont {
    pub global_subrs: Vec<Vec<u8>>,
    pub charstrings: Vec<Vec<u8>>,
    pub fds: Vec<TestFd>,
    /// FD of each glyph. Without one the font is not CID-keyed and uses
    /// the first entry of `fds` as its Private DICT.
    pub fd_select: Option<Vec<u8>>,
}

pub(crate) fn index_bytes<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let sizes = items
        .iter()
        .map(|item| item.as_ref().len())
        .collect::<Vec<_>>();
    let mut s = Serializer::new(index_size(&sizes) as u32);
    write_index(&mut s, items).unwrap();
    s.copy_bytes().unwrap()
}

fn int4(out: &mut Vec<u8>, value: usize) {
    out.push(LONG_INT_DICT);
    out.extend((value as u32).to_be_bytes());
}

/// Private DICT followed directly by its local subroutines.
fn private_and_subrs(fd: &TestFd) -> (usize, Vec<u8>) {
    let mut private = fd.private.clone();
    if !fd.subrs.is_empty() {
        int4(&mut private, fd.private.len() + 6);
        private.push(19);
    }
    let size = private.len();
    if !fd.subrs.is_empty() {
        private.extend(index_bytes(&fd.subrs));
    }
    (size, private)
}

impl TestFont {
    pub(crate) fn build(&self) -> Vec<u8> {
        let is_cid = self.fd_select.is_some();
        let name = index_bytes(&[b"Test"]);
        let strings = index_bytes(&[b"Test"]);
        // parsing an empty INDEX that is followed by other data is not
        // reliable, so always carry at least one subroutine
        let global_subrs = if self.global_subrs.is_empty() {
            index_bytes(&[[11u8]])
        } else {
            index_bytes(&self.global_subrs)
        };
        let charstrings = index_bytes(&self.charstrings);
        let privates = self.fds.iter().map(private_and_subrs).collect::<Vec<_>>();

        // version 391, then the offset operators
        let top_dict_size = 3 + if is_cid { 6 + 7 + 7 } else { 6 + 11 };
        let top_dicts_size = index_size(&[top_dict_size]);
        let charstrings_offset =
            4 + name.len() + top_dicts_size + strings.len() + global_subrs.len();
        let fd_select_offset = charstrings_offset + charstrings.len();
        let fd_select = self
            .fd_select
            .as_ref()
            .map(|fds| [&[0u8][..], fds.as_slice()].concat())
            .unwrap_or_default();
        let fd_array_offset = fd_select_offset + fd_select.len();
        let font_dict_size = 11;
        let fd_array_size = if is_cid {
            index_size(&vec![font_dict_size; self.fds.len()])
        } else {
            0
        };
        let mut private_offset = fd_array_offset + fd_array_size;
        let mut font_dicts = Vec::new();
        let mut private_ranges = Vec::new();
        for (size, data) in &privates {
            private_ranges.push((*size, private_offset));
            let mut font_dict = Vec::new();
            int4(&mut font_dict, *size);
            int4(&mut font_dict, private_offset);
            font_dict.push(18);
            font_dicts.push(font_dict);
            private_offset += data.len();
        }

        let mut top_dict = vec![248, 27, 0];
        int4(&mut top_dict, charstrings_offset);
        top_dict.push(17);
        if is_cid {
            int4(&mut top_dict, fd_array_offset);
            top_dict.extend([12, 36]);
            int4(&mut top_dict, fd_select_offset);
            top_dict.extend([12, 37]);
        } else {
            let (size, offset) = private_ranges[0];
            int4(&mut top_dict, size);
            int4(&mut top_dict, offset);
            top_dict.push(18);
        }
        assert_eq!(top_dict.len(), top_dict_size);

        let mut out = vec![1, 0, 4, 4];
        out.extend(name);
        out.extend(index_bytes(&[top_dict]));
        out.extend(strings);
        out.extend(global_subrs);
        out.extend(charstrings);
        out.extend(fd_select);
        if is_cid {
            out.extend(index_bytes(&font_dicts));
        }
        for (_, data) in privates {
            out.extend(data);
        }
        out
    }
}
