// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Kani model checking proofs for the rtdbg header prefix and object sizes.
//!
//! This standalone crate extracts the fixed 16-byte header prefix codec, the
//! flags-to-encoding mapping and the object size rule, then proves them for
//! every input with Kani.
//!
//! Run with: `cargo kani`
//!
//! ## Verified Properties
//!
//! 1. **Roundtrip**: decode(encode(p)) == p for every prefix
//! 2. **Flags**: the flags a writer derives from an encoding map back to it,
//!    and never set a reserved bit
//! 3. **Sizes**: object_size never overflows and ignores length for
//!    non-arrays

/// Bytes in the fixed prefix, independent of target encoding.
pub const HEADER_PREFIX_SIZE: usize = 16;

pub const POINTER_SIZE_8: u32 = 0b01;
pub const BIG_ENDIAN: u32 = 0b10;
pub const DEFINED_FLAGS: u32 = POINTER_SIZE_8 | BIG_ENDIAN;

// ============================================================================
// HEADER PREFIX (copied from src/header.rs)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    pub magic: [u8; 4],
    pub major: u16,
    pub minor: u16,
    pub flags: u32,
    pub reserved_padding: u32,
}

pub fn encode_prefix(p: &Prefix) -> [u8; HEADER_PREFIX_SIZE] {
    let mut out = [0u8; HEADER_PREFIX_SIZE];
    out[0..4].copy_from_slice(&p.magic);
    out[4..6].copy_from_slice(&p.major.to_le_bytes());
    out[6..8].copy_from_slice(&p.minor.to_le_bytes());
    out[8..12].copy_from_slice(&p.flags.to_le_bytes());
    out[12..16].copy_from_slice(&p.reserved_padding.to_le_bytes());
    out
}

pub fn decode_prefix(bytes: &[u8]) -> Option<Prefix> {
    if bytes.len() < HEADER_PREFIX_SIZE {
        return None;
    }
    Some(Prefix {
        magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
        major: u16::from_le_bytes([bytes[4], bytes[5]]),
        minor: u16::from_le_bytes([bytes[6], bytes[7]]),
        flags: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        reserved_padding: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
    })
}

// ============================================================================
// FLAGS (copied from src/header.rs)
// ============================================================================

/// `(pointer bytes, big endian)` to flags.
pub fn flags_for(eight_byte_pointers: bool, big_endian: bool) -> u32 {
    let mut bits = 0;
    if eight_byte_pointers {
        bits |= POINTER_SIZE_8;
    }
    if big_endian {
        bits |= BIG_ENDIAN;
    }
    bits
}

/// Flags to `(pointer bytes, big endian)`.
pub fn encoding_of(flags: u32) -> (usize, bool) {
    let width = if flags & POINTER_SIZE_8 != 0 { 8 } else { 4 };
    (width, flags & BIG_ENDIAN != 0)
}

/// Header bytes for a pointer width: prefix plus three pointer slots.
pub fn header_size(pointer_bytes: usize) -> usize {
    HEADER_PREFIX_SIZE + 3 * pointer_bytes
}

// ============================================================================
// OBJECT SIZE (copied from src/layout/object.rs)
// ============================================================================

pub fn object_size(base_size: u32, component_size: u16, length: u32) -> u64 {
    let mut size = u64::from(base_size);
    if component_size > 0 {
        size += u64::from(length) * u64::from(component_size);
    }
    size
}

// ============================================================================
// KANI MODEL CHECKING PROOFS
// ============================================================================

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// Every prefix survives encode then decode.
    #[kani::proof]
    fn verify_prefix_roundtrip() {
        let prefix = Prefix {
            magic: kani::any(),
            major: kani::any(),
            minor: kani::any(),
            flags: kani::any(),
            reserved_padding: kani::any(),
        };
        let bytes = encode_prefix(&prefix);
        kani::assert(
            decode_prefix(&bytes) == Some(prefix),
            "prefix must roundtrip",
        );
    }

    /// Short buffers are rejected without panicking.
    #[kani::proof]
    #[kani::unwind(17)]
    fn verify_decode_short_input() {
        let len: usize = kani::any_where(|&n| n < HEADER_PREFIX_SIZE);
        let bytes = [0u8; HEADER_PREFIX_SIZE];
        kani::assert(
            decode_prefix(&bytes[..len]).is_none(),
            "short prefix must be rejected",
        );
    }

    /// Writers never set a reserved bit, and readers recover the encoding.
    #[kani::proof]
    fn verify_flags_roundtrip() {
        let eight: bool = kani::any();
        let big: bool = kani::any();
        let flags = flags_for(eight, big);

        kani::assert(flags & !DEFINED_FLAGS == 0, "no reserved bits");
        let (width, big_endian) = encoding_of(flags);
        kani::assert(width == if eight { 8 } else { 4 }, "width must roundtrip");
        kani::assert(big_endian == big, "byte order must roundtrip");
        kani::assert(
            header_size(width) == if eight { 40 } else { 28 },
            "header is 28 or 40 bytes",
        );
    }

    /// The size rule cannot overflow and only arrays grow with length.
    #[kani::proof]
    fn verify_object_size() {
        let base: u32 = kani::any();
        let component: u16 = kani::any();
        let length: u32 = kani::any();

        let size = object_size(base, component, length);
        kani::assert(size >= u64::from(base), "size at least base");
        if component == 0 {
            kani::assert(size == u64::from(base), "length ignored for non-arrays");
        } else {
            kani::assert(
                size == u64::from(base) + u64::from(length) * u64::from(component),
                "arrays add length * component",
            );
        }
    }
}
