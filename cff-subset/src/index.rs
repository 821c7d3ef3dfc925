//! Serialization of CFF INDEX data.
//!
//! See "5 INDEX Data" at <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf#page=12>

use crate::serialize::{SerializeErrorFlags, Serializer};

/// Offset size that can address the end of `data_size` bytes of object data.
fn off_size(data_size: usize) -> usize {
    // offsets are 1 based
    match data_size + 1 {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x10000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Size of an INDEX holding objects of the given sizes.
///
/// An empty INDEX is just its two byte count.
pub fn index_size(item_sizes: &[usize]) -> usize {
    if item_sizes.is_empty() {
        return 2;
    }
    let data_size: usize = item_sizes.iter().sum();
    2 + 1 + (item_sizes.len() + 1) * off_size(data_size) + data_size
}

/// Writes the count, offset size and offset array of an INDEX.
///
/// The caller appends the object data, in order, right after.
pub fn write_index_header(
    s: &mut Serializer,
    item_sizes: &[usize],
) -> Result<(), SerializeErrorFlags> {
    if item_sizes.len() > u16::MAX as usize {
        return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_ARRAY_OVERFLOW));
    }
    s.embed(item_sizes.len() as u16)?;
    if item_sizes.is_empty() {
        return Ok(());
    }
    let data_size: usize = item_sizes.iter().sum();
    if data_size >= u32::MAX as usize {
        return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OFFSET_OVERFLOW));
    }
    let off_size = off_size(data_size);
    s.embed(off_size as u8)?;
    let mut offset = 1u32;
    for size in std::iter::once(0).chain(item_sizes.iter().copied()) {
        offset += size as u32;
        s.embed_bytes(&offset.to_be_bytes()[4 - off_size..])?;
    }
    Ok(())
}

/// Writes a complete INDEX.
pub fn write_index<T: AsRef<[u8]>>(s: &mut Serializer, items: &[T]) -> Result<(), SerializeErrorFlags> {
    let sizes = items
        .iter()
        .map(|item| item.as_ref().len())
        .collect::<Vec<_>>();
    write_index_header(s, &sizes)?;
    for item in items {
        s.embed_bytes(item.as_ref())?;
    }
    Ok(())
}
