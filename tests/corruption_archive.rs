//! Archive corruption detection tests
//!
//! Damaged images must fail with `CorruptArchive` (or `MissingKeyFormat`
//! when the key format is gone), never panic or read out of bounds.

use car_archive::{
    AttributeIdentifier::*, AttributeList, BlockRef, CarError, Facet, KeyFormat, PixelFormat,
    Reader, Rendition, RenditionData, Store, Writer,
};

fn archive() -> Vec<u8> {
    let mut writer = Writer::new();
    writer.set_key_format(KeyFormat::new([Scale, Identifier])).unwrap();
    writer
        .add_facet(Facet::new("icon", AttributeList::new().with(Identifier, 1u16)))
        .unwrap();
    writer
        .add_rendition(
            Rendition::new(AttributeList::new().with(Identifier, 1u16).with(Scale, 2u16))
                .with_size(2, 2)
                .with_scale(2.0)
                .with_file_name("icon@2x.png")
                .with_data(RenditionData::new(vec![0xAB; 16], PixelFormat::PremultipliedBGRA8)),
        )
        .unwrap();
    writer.write().unwrap()
}

fn any_facet() -> Facet {
    Facet::new("any", AttributeList::new())
}

/// Rendition record with caller-chosen block references
fn record(attributes_block: BlockRef, payload_block: BlockRef, payload_length: u32) -> Vec<u8> {
    let name = b"broken.png";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"ISTC");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&attributes_block.id().to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&100u16.to_le_bytes());
    bytes.extend_from_slice(&12u16.to_le_bytes());
    bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
    bytes.extend_from_slice(name);
    bytes.extend_from_slice(&PixelFormat::Data.code().to_le_bytes());
    bytes.extend_from_slice(&payload_block.id().to_le_bytes());
    bytes.extend_from_slice(&payload_length.to_le_bytes());
    bytes
}

/// Loaded archive store plus one extra rendition under a new key
fn with_extra_rendition(build: impl FnOnce(&mut Store, &[u8]) -> Vec<u8>) -> Reader {
    let mut store = Store::load(&archive()).unwrap();
    let key = KeyFormat::new([Scale, Identifier])
        .encode(&AttributeList::new().with(Scale, 3u16).with(Identifier, 1u16));
    let value = build(&mut store, &key);
    store.insert("RENDITIONS", &key, &value).unwrap();
    Reader::load(&store.serialize().unwrap()).unwrap()
}

#[test]
fn test_truncation_always_fails() {
    let image = archive();
    for cut in 1..image.len() {
        let err = Reader::load(&image[..image.len() - cut]).unwrap_err();
        assert!(err.is_corrupt(), "cut of {} bytes: {:?}", cut, err);
    }
    assert!(Reader::load(&[]).unwrap_err().is_corrupt());
}

#[test]
fn test_bad_magic() {
    let mut image = archive();
    image[0] = b'X';
    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}

#[test]
fn test_unsupported_version() {
    let mut image = archive();
    image[8..12].copy_from_slice(&9u32.to_be_bytes());
    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}

#[test]
fn test_index_out_of_range() {
    let mut image = archive();
    let len = image.len() as u32;
    image[16..20].copy_from_slice(&(len + 1).to_be_bytes());
    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}

#[test]
fn test_missing_key_format() {
    let mut store = Store::load(&archive()).unwrap();
    let header = store.var("CARHEADER").unwrap();
    // Catalog header alone, no key format variable
    let mut bare = Store::new();
    let copy = bare.allocate(store.block(header).unwrap()).unwrap();
    bare.set_var("CARHEADER", copy).unwrap();
    assert!(matches!(
        Reader::load(&bare.serialize().unwrap()),
        Err(CarError::MissingKeyFormat)
    ));

    // A key format block that is not a key format record
    let junk = store.allocate(b"not a key format").unwrap();
    store.set_var("KEYFORMAT", junk).unwrap();
    assert!(Reader::load(&store.serialize().unwrap())
        .unwrap_err()
        .is_corrupt());
}

#[test]
fn test_corrupt_catalog_header() {
    let mut store = Store::load(&archive()).unwrap();
    let junk = store.allocate(&[0u8; 20]).unwrap();
    store.set_var("CARHEADER", junk).unwrap();
    assert!(Reader::load(&store.serialize().unwrap())
        .unwrap_err()
        .is_corrupt());
}

#[test]
fn test_corrupt_facet_value() {
    let mut store = Store::load(&archive()).unwrap();
    store.insert("FACETKEYS", b"broken", &[1, 2, 3]).unwrap();
    let reader = Reader::load(&store.serialize().unwrap()).unwrap();

    assert!(reader.facets().unwrap_err().is_corrupt());
    // Lookups past the broken entry still work
    assert!(reader.lookup_facet("icon").unwrap().is_some());
}

#[test]
fn test_payload_block_missing() {
    let reader = with_extra_rendition(|store, key| {
        let attributes = store.allocate(key).unwrap();
        record(attributes, BlockRef::from_raw(10_000), 8)
    });
    assert!(reader.lookup_renditions(&any_facet()).unwrap_err().is_corrupt());

    // A pattern the broken rendition does not match still succeeds
    let icon = Facet::new("icon", AttributeList::new().with(Scale, 2u16));
    assert_eq!(reader.lookup_renditions(&icon).unwrap().len(), 1);
}

#[test]
fn test_payload_length_mismatch() {
    let reader = with_extra_rendition(|store, key| {
        let attributes = store.allocate(key).unwrap();
        let payload = store.allocate(&[1u8; 8]).unwrap();
        record(attributes, payload, 9)
    });
    assert!(reader.lookup_renditions(&any_facet()).unwrap_err().is_corrupt());
}

#[test]
fn test_attributes_block_mismatch() {
    let reader = with_extra_rendition(|store, _key| {
        let attributes = store.allocate(&[0u8; 8]).unwrap();
        let payload = store.allocate(&[1u8; 8]).unwrap();
        record(attributes, payload, 8)
    });
    assert!(reader.lookup_renditions(&any_facet()).unwrap_err().is_corrupt());
}

#[test]
fn test_key_field_over_u16() {
    let mut store = Store::load(&archive()).unwrap();
    let mut key = vec![0u8; 8];
    key[..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    store.insert("RENDITIONS", &key, b"unused").unwrap();
    let reader = Reader::load(&store.serialize().unwrap()).unwrap();

    assert!(reader.lookup_renditions(&any_facet()).unwrap_err().is_corrupt());
    assert!(reader
        .rendition_iterate(|_| -> car_archive::Result<()> { Ok(()) })
        .unwrap_err()
        .is_corrupt());
}

#[test]
fn test_broken_tree_fails_load() {
    let mut image = archive();
    let store = Store::load(&image).unwrap();
    let tree = store.var("RENDITIONS").unwrap();
    let tree_bytes = store.block(tree).unwrap().to_vec();

    // The tree header block is unique in the image; break its magic
    let at = image
        .windows(tree_bytes.len())
        .position(|w| w == tree_bytes.as_slice())
        .unwrap();
    image[at..at + 4].copy_from_slice(b"eert");

    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}

fn index_offset(image: &[u8]) -> usize {
    u32::from_be_bytes(image[16..20].try_into().unwrap()) as usize
}

#[test]
fn test_free_extent_outside_image() {
    let mut store = Store::load(&archive()).unwrap();
    let spare = store.allocate(&[0x55; 32]).unwrap();
    let keep = store.allocate(&[0x66; 8]).unwrap();
    store.set_var("KEEP", keep).unwrap();
    store.free(spare).unwrap();
    let mut image = store.serialize().unwrap();
    assert!(Reader::load(&image).is_ok());

    // Free list follows the block table
    let index = index_offset(&image);
    let slots = u32::from_be_bytes(image[index..index + 4].try_into().unwrap()) as usize;
    let free = index + 4 + slots * 8;
    assert_eq!(&image[free..free + 4], &1u32.to_be_bytes());

    let past_end = image.len() as u32;
    image[free + 4..free + 8].copy_from_slice(&past_end.to_be_bytes());
    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}

#[test]
fn test_live_block_overlapping_header() {
    let mut image = archive();
    let entry = index_offset(&image) + 4 + 8;
    image[entry..entry + 4].copy_from_slice(&100u32.to_be_bytes());
    assert!(Reader::load(&image).unwrap_err().is_corrupt());
}
