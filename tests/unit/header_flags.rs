//! Header construction: flags, cookie, byte layout.

use crate::common::{BE32, BE64, LE32, LE64};
use rtdbg::header::HEADER_PREFIX_SIZE;
use rtdbg::wire::get_u32_le;
use rtdbg::{
    ContractHeader, ContractVersion, Endianness, HeaderFlags, HeaderPrefix, Magic, PointerWidth,
    TargetEncoding,
};

#[test]
fn test_flags_reflect_every_encoding() {
    let cases = [
        (LE32, 0b00),
        (LE64, 0b01),
        (BE32, 0b10),
        (BE64, 0b11),
    ];
    for (enc, bits) in cases {
        let header = ContractHeader::new(enc);
        assert_eq!(header.prefix.flags.bits(), bits, "{}", enc);
        assert_eq!(header.prefix.flags.pointer_width(), enc.pointer_width);
        assert_eq!(header.prefix.flags.endianness(), enc.endianness);
        assert_eq!(header.encoding(), enc);

        // The flags word is little-endian no matter the target order
        let bytes = header.encode().unwrap();
        assert_eq!(get_u32_le(&bytes, 8).unwrap(), bits);
    }
}

#[test]
fn test_host_header_matches_build() {
    let header = ContractHeader::new(TargetEncoding::host());
    let expect_8 = cfg!(target_pointer_width = "64");
    let expect_be = cfg!(target_endian = "big");
    assert_eq!(
        header.prefix.flags.bits() & HeaderFlags::POINTER_SIZE_8 != 0,
        expect_8
    );
    assert_eq!(header.prefix.flags.bits() & HeaderFlags::BIG_ENDIAN != 0, expect_be);
}

#[test]
fn test_prefix_bytes() {
    let bytes = ContractHeader::new(LE64).encode().unwrap();
    assert_eq!(bytes.len(), HEADER_PREFIX_SIZE + 3 * 8);
    assert_eq!(&bytes[0..4], &[0x4E, 0x41, 0x44, 0x48]);
    assert_eq!(&bytes[4..6], &1u16.to_le_bytes());
    assert_eq!(&bytes[6..8], &0u16.to_le_bytes());
    assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    // Null list heads, null defines slot
    assert!(bytes[16..].iter().all(|&b| b == 0));
}

#[test]
fn test_header_sizes() {
    assert_eq!(ContractHeader::size(PointerWidth::Four), 28);
    assert_eq!(ContractHeader::size(PointerWidth::Eight), 40);
}

#[test]
fn test_prefix_decode_inverts_encode() {
    let header = ContractHeader::new(BE32);
    let decoded = HeaderPrefix::decode(&header.prefix.encode()).unwrap();
    assert_eq!(decoded, header.prefix);
    assert_eq!(decoded.magic, Magic::LIST_HEADER);
    assert_eq!(decoded.version, ContractVersion::CURRENT);
}

#[test]
fn test_generations_are_distinct() {
    assert_ne!(Magic::LIST_HEADER, Magic::SUBSYSTEM_HEADER);
    assert_eq!(Magic::SUBSYSTEM_HEADER.bytes(), [0x6e, 0x66, 0x31, 0x36]);
    assert!(Magic::LIST_HEADER.generation().is_some());
    assert!(Magic::SUBSYSTEM_HEADER.generation().is_some());
    assert_eq!(Magic([0, 0, 0, 0]).generation(), None);
}

#[test]
fn test_reserved_bits_rejected() {
    assert!(HeaderFlags(HeaderFlags::DEFINED).validate().is_ok());
    assert!(HeaderFlags(0b100).validate().is_err());
    assert_eq!(HeaderFlags(0xFF).reserved_bits(), 0xFC);
}

#[test]
fn test_version_parsing_and_support() {
    let v: ContractVersion = "2.5".parse().unwrap();
    assert_eq!(v, ContractVersion::new(2, 5));
    assert!("2".parse::<ContractVersion>().is_err());
    assert!(ContractVersion::new(1, 9).is_supported_by(1));
    assert!(!ContractVersion::new(2, 0).is_supported_by(1));
    assert_eq!(
        TargetEncoding::new(PointerWidth::Eight, Endianness::Big).to_string(),
        "64-bit big-endian"
    );
}
