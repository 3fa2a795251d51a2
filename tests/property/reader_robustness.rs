//! The reader on hostile memory: errors, never panics or loops.

use proptest::prelude::*;
use rtdbg::header::HEADER_PREFIX_SIZE;
use rtdbg::reader::ReaderLimits;
use rtdbg::{ContractReader, Magic, MemoryImage, Probe, Snapshot};

use crate::common::{encode_with_header, pairs_registry, LE64};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Property: random bytes behind a valid cookie never panic the reader.
    #[test]
    fn prop_random_payload_is_safe(
        mut bytes in prop::collection::vec(any::<u8>(), HEADER_PREFIX_SIZE..512),
        version in 0u16..3,
    ) {
        bytes[0..4].copy_from_slice(&Magic::LIST_HEADER.bytes());
        bytes[4..6].copy_from_slice(&version.to_le_bytes());
        let image = MemoryImage::new(0x1000, bytes);
        let reader = ContractReader::new().with_limits(ReaderLimits {
            max_list_len: 64,
            max_name_len: 64,
        });
        let _ = reader.read(&image, 0x1000);
    }

    /// Property: flipping any byte of a real contract gives an error or a
    /// view, never a panic.
    #[test]
    fn prop_corrupted_contract_is_safe(index in any::<prop::sample::Index>(), value in any::<u8>()) {
        let mut image = encode_with_header(&pairs_registry(8), LE64);
        let at = index.index(image.bytes.len());
        image.bytes[at] = value;
        let _ = ContractReader::new().read(&image, image.base);
    }

    /// Property: any cookie other than the expected one is "not present".
    #[test]
    fn prop_foreign_cookie_not_present(cookie in any::<[u8; 4]>()) {
        prop_assume!(cookie != Magic::LIST_HEADER.bytes());
        let mut image = encode_with_header(&pairs_registry(2), LE64);
        image.bytes[0..4].copy_from_slice(&cookie);
        let probe = ContractReader::new().probe(&image, image.base).unwrap();
        prop_assert_eq!(probe, Probe::NotPresent { found: Magic(cookie) });
    }

    /// Property: snapshot parsing rejects garbage without panicking.
    #[test]
    fn prop_snapshot_garbage_is_safe(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Snapshot::from_bytes(&bytes);
    }
}
