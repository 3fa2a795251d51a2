//! The normative reader protocol against encoded contracts.

use rtdbg::reader::RegionMemory;
use rtdbg::registry::CONTRACT_FIELDS;
use rtdbg::wire::{encode_object, encode_type_descriptor};
use rtdbg::{
    object_size, ContractHeader, ContractReader, ContractVersion, HeaderFlags, Magic, MemoryImage,
    ObjectReader, ObjectShape, Probe, ReadError, Registry, TargetEncoding, TypeDescriptor,
};

use crate::common::{
    detached_header, header_only, pairs_registry, read_back, runtime_globals, table_registry,
    CountingMemory, FIXTURE_BASE, LE32, LE64,
};

#[test]
fn test_fixed_table_on_every_target() {
    for enc in TargetEncoding::ALL {
        let registry = table_registry(enc, &runtime_globals());
        let view = read_back(&registry, enc);
        let shape = ObjectShape::new(enc.pointer_width);

        assert_eq!(view.magic, Magic::LIST_HEADER);
        assert_eq!(view.version, ContractVersion::CURRENT);
        assert_eq!(view.encoding, enc);
        for fact in CONTRACT_FIELDS {
            assert_eq!(
                view.field(fact.type_name, fact.field_name),
                Some(fact.offset_for(&shape)),
                "{} on {}",
                fact.field_name,
                enc
            );
        }
        assert_eq!(view.global("g_stressLog"), Some(0x0020_0300));
        assert_eq!(view.define("ArrayBaseSize"), Some(shape.array_base_size()));
    }
}

#[test]
fn test_generations_never_cross_accepted() {
    let image = crate::common::encode_with_header(&pairs_registry(3), LE64);

    // Expecting the other generation: not present, not an error
    let probe = ContractReader::new()
        .expecting(Magic::SUBSYSTEM_HEADER)
        .probe(&image, image.base)
        .unwrap();
    assert_eq!(probe, Probe::NotPresent { found: Magic::LIST_HEADER });

    // The other generation's cookie in front of a list header
    let mut foreign = image.clone();
    foreign.bytes[0..4].copy_from_slice(&Magic::SUBSYSTEM_HEADER.bytes());
    assert!(ContractReader::new()
        .read(&foreign, foreign.base)
        .unwrap()
        .is_none());
}

#[test]
fn test_unsupported_major_reads_only_the_prefix() {
    let image = header_only(LE64, ContractVersion::new(2, 0), HeaderFlags::POINTER_SIZE_8);
    let counting = CountingMemory::new(image);
    let err = ContractReader::new()
        .read(&counting, FIXTURE_BASE)
        .unwrap_err();
    assert!(matches!(
        err,
        ReadError::UnsupportedVersion { supported: 1, .. }
    ));
    assert_eq!(counting.reads(), 1);
}

#[test]
fn test_newer_reader_accepts_older_major() {
    let image = crate::common::encode_with_header(&pairs_registry(4), LE32);
    let view = ContractReader::new()
        .with_supported(ContractVersion::new(3, 2))
        .read(&image, image.base)
        .unwrap()
        .unwrap();
    assert_eq!(view.types.len(), 4);
}

#[test]
fn test_null_heads_mean_empty_contract() {
    let image = header_only(LE32, ContractVersion::CURRENT, 0);
    let view = ContractReader::new()
        .read(&image, FIXTURE_BASE)
        .unwrap()
        .unwrap();
    assert!(view.is_empty());
    assert!(view.lists.is_null());
    assert_eq!(view.field("Object", "m_pEEType"), None);
}

#[test]
fn test_header_placed_apart_from_lists() {
    for enc in TargetEncoding::ALL {
        let registry = table_registry(enc, &runtime_globals());
        let (memory, header_address) = detached_header(&registry, enc);
        let view = ContractReader::new()
            .read(&memory, header_address)
            .unwrap()
            .unwrap();
        assert_eq!(view.types.len(), registry.type_count());
        assert_eq!(view.globals.len(), registry.global_count());
        assert_eq!(view.lists.defines_list, 0);
    }
}

#[test]
fn test_unmapped_list_is_an_error() {
    let mut registry = Registry::new();
    registry.register_field("A", "b", 4);
    let (memory, header_address) = detached_header(&registry, LE64);
    // Drop the list region, keep the header
    let kept: Vec<MemoryImage> = memory
        .into_regions()
        .into_iter()
        .filter(|r| r.base == header_address)
        .collect();
    let memory = RegionMemory::new().with(kept[0].clone()).unwrap();
    let err = ContractReader::new()
        .read(&memory, header_address)
        .unwrap_err();
    assert!(matches!(err, ReadError::Memory { .. }));
}

#[test]
fn test_object_reader_agrees_with_size_rule() {
    for enc in TargetEncoding::ALL {
        let shape = ObjectShape::new(enc.pointer_width);
        let registry = table_registry(enc, &runtime_globals());
        let view = read_back(&registry, enc);
        let objects = ObjectReader::new(&view).unwrap();

        let types = [
            TypeDescriptor::fixed(shape.min_object_size()),
            TypeDescriptor::array(shape.array_base_size(), 1),
            TypeDescriptor::array(shape.array_base_size(), 8),
            TypeDescriptor::string(shape.array_base_size()),
        ];
        for (i, ty) in types.iter().enumerate() {
            for length in [0u32, 1, 7, 1000] {
                let type_address = 0x0300_0000 + (i as u64) * 0x100;
                let object_start = 0x0400_0000;
                let mut memory = RegionMemory::new();
                memory
                    .map(MemoryImage::new(
                        type_address,
                        encode_type_descriptor(enc, ty, 0, 0).unwrap(),
                    ))
                    .unwrap();
                memory
                    .map(MemoryImage::new(
                        object_start,
                        encode_object(enc, ty, type_address, 0, length).unwrap(),
                    ))
                    .unwrap();

                let info = objects
                    .read_object(&memory, object_start + u64::from(shape.header_size()))
                    .unwrap();
                let expected_length = if ty.component_size > 0 { length } else { 0 };
                assert_eq!(
                    info.size,
                    object_size(ty.base_size, ty.component_size, expected_length)
                );
                assert_eq!(info.ty.base_size, ty.base_size);
                assert_eq!(info.ty.component_size, ty.component_size);
            }
        }
    }
}

#[test]
fn test_object_reader_needs_layout_entries() {
    let view = read_back(&pairs_registry(2), LE64);
    assert!(matches!(
        ObjectReader::new(&view),
        Err(ReadError::MissingEntry { .. })
    ));
}

#[test]
fn test_header_size_depends_only_on_width() {
    assert_eq!(
        ContractHeader::new(LE64).encode().unwrap().len(),
        ContractHeader::size(LE64.pointer_width)
    );
}
