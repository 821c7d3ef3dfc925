#![no_main]
use std::error::Error;

use cff_subset::{CffAccelerator, CffSource, CffSubsetLayout, SubsetFlags};
use font_types::GlyphId;
use libfuzzer_sys::{
    arbitrary::{self, Arbitrary},
    fuzz_target,
};

#[derive(Arbitrary, Debug)]
struct SubsetRequest<'a> {
    glyphs: Vec<u16>,
    flags: u16,
    base: u32,
    cff: &'a [u8],
}

fn do_subset_things(request: SubsetRequest) -> Result<(), Box<dyn Error>> {
    let acc = CffAccelerator::new(request.cff)?;
    let glyphs = request
        .glyphs
        .iter()
        .map(|gid| GlyphId::new(*gid as u32 % acc.num_glyphs().max(1)))
        .collect::<Vec<_>>();
    let mut layout = CffSubsetLayout::plan(&acc, &glyphs, SubsetFlags::from(request.flags))?;
    let offsets = layout.assign_offsets(request.base)?;
    let expected = offsets
        .private_dicts
        .last()
        .map(|private| private.end())
        .unwrap_or(offsets.fd_array.end())
        - request.base as u64;
    let serialized = layout.serialize()?;
    assert_eq!(serialized.tail.len() as u64, expected);
    assert_eq!(serialized.top_dict.len(), layout.top_dict_size());
    Ok(())
}

fuzz_target!(|request: SubsetRequest| {
    let _ = do_subset_things(request);
});
