//! Property-based tests for key formats, trees, and lookups
//!
//! Uses proptest to check that encoding, ordering, and matching hold across
//! random attribute sets and archives.

use car_archive::{
    AttributeIdentifier, AttributeList, Facet, KeyFormat, PixelFormat, Reader, Rendition,
    RenditionData, Store, Writer,
};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = AttributeIdentifier> {
    (1u16..=30).prop_map(AttributeIdentifier::from_u16)
}

fn key_format() -> impl Strategy<Value = KeyFormat> {
    prop::collection::vec(identifier(), 0..14).prop_map(KeyFormat::new)
}

fn attributes() -> impl Strategy<Value = AttributeList> {
    prop::collection::vec((identifier(), any::<u16>()), 0..10).prop_map(AttributeList::from_pairs)
}

/// Small value domain so random patterns actually match
fn narrow_attributes(format: Vec<AttributeIdentifier>) -> impl Strategy<Value = AttributeList> {
    prop::collection::vec((prop::sample::select(format), 0u16..3), 0..4)
        .prop_map(AttributeList::from_pairs)
}

proptest! {
    #[test]
    fn prop_key_format_fidelity(format in key_format(), attrs in attributes()) {
        let key = format.encode(&attrs);
        prop_assert_eq!(key.len(), format.key_len());

        let decoded = format.decode(&key).unwrap();
        prop_assert_eq!(decoded.len(), format.len());
        for id in format.identifiers() {
            prop_assert_eq!(decoded.get(*id), Some(attrs.get(*id).unwrap_or(0)));
        }
        for (id, _) in decoded.iter() {
            prop_assert!(format.contains(id));
        }
    }

    #[test]
    fn prop_key_format_record_round_trip(format in key_format()) {
        prop_assert_eq!(KeyFormat::from_bytes(&format.to_bytes()).unwrap(), format);
    }

    #[test]
    fn prop_facet_value_round_trip(attrs in attributes()) {
        let bytes = attrs.to_facet_bytes().unwrap();
        prop_assert_eq!(AttributeList::from_facet_bytes(&bytes).unwrap(), attrs);
    }

    #[test]
    fn prop_key_order_is_value_order(
        format in key_format(),
        a in attributes(),
        b in attributes(),
    ) {
        let values = |attrs: &AttributeList| -> Vec<u16> {
            format.identifiers().iter().map(|id| attrs.get(*id).unwrap_or(0)).collect()
        };
        prop_assert_eq!(
            format.encode(&a).cmp(&format.encode(&b)),
            values(&a).cmp(&values(&b))
        );
    }

    #[test]
    fn prop_tree_iterates_sorted(
        keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..12), 0..300),
        page_size in 64u32..512,
    ) {
        let mut store = Store::with_page_size(page_size);
        for (i, key) in keys.iter().enumerate() {
            store.insert("TREE", key, &(i as u32).to_le_bytes()).unwrap();
        }

        let loaded = Store::load(&store.serialize().unwrap()).unwrap();
        let entries = loaded.iterate("TREE").unwrap();

        let mut expected: Vec<(Vec<u8>, u32)> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i as u32))
            .collect();
        // Stable: equal keys keep insertion order
        expected.sort_by(|a, b| a.0.cmp(&b.0));

        prop_assert_eq!(entries.len(), expected.len());
        for (entry, (key, index)) in entries.iter().zip(&expected) {
            prop_assert_eq!(entry.key, key.as_slice());
            prop_assert_eq!(entry.value, &index.to_le_bytes()[..]);
        }
    }

    #[test]
    fn prop_free_then_allocate_reuses(sizes in prop::collection::vec(1usize..256, 1..40)) {
        let mut store = Store::new();
        let blocks: Vec<_> = sizes
            .iter()
            .map(|size| store.allocate(&vec![0xEE; *size]).unwrap())
            .collect();
        let live = store.live_blocks();

        for block in &blocks {
            store.free(*block).unwrap();
        }
        prop_assert_eq!(store.live_blocks(), live - blocks.len());

        // Same sizes again fit in the freed space under the same IDs
        let again: Vec<_> = sizes
            .iter()
            .map(|size| store.allocate(&vec![0x11; *size]).unwrap())
            .collect();
        let mut old_ids: Vec<_> = blocks.iter().map(|b| b.id()).collect();
        let mut new_ids: Vec<_> = again.iter().map(|b| b.id()).collect();
        old_ids.sort_unstable();
        new_ids.sort_unstable();
        prop_assert_eq!(old_ids, new_ids);

        for (block, size) in again.iter().zip(&sizes) {
            let expected = vec![0x11; *size];
            prop_assert_eq!(store.block(*block).unwrap(), expected.as_slice());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lookup_matches_brute_force(
        (format, renditions, pattern) in prop::collection::vec(identifier(), 1..6)
            .prop_map(KeyFormat::new)
            .prop_flat_map(|format| {
                let ids = format.identifiers().to_vec();
                (
                    Just(format),
                    prop::collection::vec(narrow_attributes(ids.clone()), 0..20),
                    narrow_attributes(ids),
                )
            })
    ) {
        let mut writer = Writer::new();
        writer.set_key_format(format.clone()).unwrap();
        for (i, attrs) in renditions.iter().enumerate() {
            writer
                .add_rendition(
                    Rendition::new(attrs.clone())
                        .with_file_name(i.to_string())
                        .with_data(RenditionData::new(vec![i as u8], PixelFormat::Data)),
                )
                .unwrap();
        }
        let reader = Reader::load(&writer.write().unwrap()).unwrap();

        let found = reader
            .lookup_renditions(&Facet::new("pattern", pattern.clone()))
            .unwrap();
        let mut found: Vec<usize> = found
            .iter()
            .map(|r| r.file_name().parse().unwrap())
            .collect();
        found.sort_unstable();

        let expected: Vec<usize> = renditions
            .iter()
            .enumerate()
            .filter(|(_, attrs)| format.normalize(attrs).matches(&pattern))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(found, expected);
    }
}
