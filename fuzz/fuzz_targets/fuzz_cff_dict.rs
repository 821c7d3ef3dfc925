#![no_main]
use cff_subset::{
    dict::parse_dict, DictOpSerializer, FontDictSerializer, OffsetTable, PrivateDictSerializer,
    Serializer, TableInfo, TopDictSerializer,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(ops) = parse_dict(data) else {
        return;
    };
    // the operator strings tile the input
    assert_eq!(ops.iter().map(|op| op.bytes.len()).sum::<usize>(), data.len());

    let offsets = OffsetTable {
        private_dicts: vec![TableInfo {
            offset: 0x1234,
            size: 0x56,
        }],
        ..Default::default()
    };
    let size = TopDictSerializer.dict_size(&ops, &offsets);
    let mut s = Serializer::new(size as u32);
    TopDictSerializer
        .serialize_dict(&mut s, &ops, &offsets)
        .unwrap();
    assert_eq!(s.remaining(), 0);

    let size = FontDictSerializer.dict_size(&ops, &offsets.private_dicts[0]);
    let mut s = Serializer::new(size as u32);
    FontDictSerializer
        .serialize_dict(&mut s, &ops, &offsets.private_dicts[0])
        .unwrap();
    assert_eq!(s.remaining(), 0);

    let private = PrivateDictSerializer::new(true);
    let size = private.dict_size(&ops, &());
    let mut s = Serializer::new(size as u32);
    private.serialize_dict(&mut s, &ops, &()).unwrap();
    assert_eq!(s.remaining(), 0);
});
