//! Runtime contracts for the object model and the published layout.
//!
//! Debug-mode assertions that catch caller bugs the type system cannot:
//!
//! 1. **Zero-cost in release builds** (`debug_assert!`)
//! 2. **Early failure** during development and in test harnesses
//! 3. **Mirror the documented invariants** one function per invariant
//!
//! # INVARIANTS (DO NOT REMOVE THESE CHECKS)
//!
//! A debugger trusts what the contract says without being able to ask the
//! target. Weakening a check here lets a bad layout ship silently.
//!
//! | Contract Function          | Invariant                                        |
//! |----------------------------|--------------------------------------------------|
//! | `check_component_size`     | non-array types have `component_size <= 2`       |
//! | `check_flags_defined`      | no reserved header flag bit is set when writing  |
//! | `check_list_links`         | registry links only point at older entries       |
//! | `check_offset_in_type`     | a field starts no later than its type's `SIZEOF` |
//!
//! # Usage
//!
//! ```ignore
//! use rtdbg::contracts::*;
//!
//! // In debug builds, this panics if the invariant is violated
//! check_component_size(&descriptor);
//!
//! // In release builds, this is a no-op
//! ```

// ============================================================================
// COMPILE-TIME ASSERTIONS (evaluated at build time)
// ============================================================================

/// The fixed header prefix and entry shapes cannot drift silently.
const _: () = {
    use crate::header::{ContractHeader, HeaderFlags, HEADER_PREFIX_SIZE};
    use crate::wire::{
        global_entry_size, type_entry_size, Endianness, PointerWidth, TargetEncoding,
    };

    const LE4: TargetEncoding = TargetEncoding::new(PointerWidth::Four, Endianness::Little);
    const LE8: TargetEncoding = TargetEncoding::new(PointerWidth::Eight, Endianness::Little);

    // Cookie, two versions, flags, padding
    assert!(HEADER_PREFIX_SIZE == 4 + 2 + 2 + 4 + 4);
    assert!(ContractHeader::size(PointerWidth::Four) == 28);
    assert!(ContractHeader::size(PointerWidth::Eight) == 40);

    // Pointer slots start pointer-aligned on both widths
    assert!(HEADER_PREFIX_SIZE % 8 == 0);

    assert!(type_entry_size(LE4) == 16);
    assert!(type_entry_size(LE8) == 32);
    assert!(global_entry_size(LE4) == 12);
    assert!(global_entry_size(LE8) == 24);

    // Only two flag bits have meaning in 1.x
    assert!(HeaderFlags::DEFINED == 0b11);
};

use crate::header::HeaderFlags;
use crate::layout::TypeDescriptor;
use crate::registry::Registry;

// ============================================================================
// OBJECT MODEL CONTRACTS
// ============================================================================

/// Check the component size rule before computing an object's size.
///
/// # Panics (debug builds only)
/// Panics if a non-array type declares elements wider than 2 bytes.
#[inline]
pub fn check_component_size(ty: &TypeDescriptor) {
    debug_assert!(
        ty.is_array() || ty.component_size <= 2,
        "Contract violation: non-array type has component_size {} (max 2)",
        ty.component_size
    );
}

// ============================================================================
// HEADER CONTRACTS
// ============================================================================

/// Writers must never emit reserved flag bits.
///
/// # Panics (debug builds only)
/// Panics if any bit outside `HeaderFlags::DEFINED` is set.
#[inline]
pub fn check_flags_defined(flags: HeaderFlags) {
    debug_assert!(
        flags.reserved_bits() == 0,
        "Contract violation: reserved header flag bits set: {:#010x}",
        flags.reserved_bits()
    );
}

// ============================================================================
// REGISTRY CONTRACTS
// ============================================================================

/// Every `next` link points at a strictly older entry, so traversal from the
/// head terminates and visits each entry once.
///
/// # Panics (debug builds only)
/// Panics on a link to the entry itself or to a newer one.
pub fn check_list_links(registry: &Registry) {
    #[cfg(debug_assertions)]
    {
        for (i, entry) in registry.type_arena().iter().enumerate() {
            if let Some(next) = entry.next() {
                assert!(
                    next.index() < i,
                    "Contract violation: type entry {} links forward to {}",
                    i,
                    next.index()
                );
            }
        }
        for (i, entry) in registry.global_arena().iter().enumerate() {
            if let Some(next) = entry.next() {
                assert!(
                    next.index() < i,
                    "Contract violation: global entry {} links forward to {}",
                    i,
                    next.index()
                );
            }
        }
    }
    #[cfg(not(debug_assertions))]
    let _ = registry;
}

/// A field must start inside its type, when the type's size is known.
/// Trailing slot arrays (`EEType.m_VTable`) start exactly at `SIZEOF`.
///
/// # Panics (debug builds only)
/// Panics if `type_name.field_name` starts past `SIZEOF(type_name)`.
pub fn check_offset_in_type(registry: &Registry, type_name: &str, field_name: &str) {
    if let (Some(size), Some(offset)) = (
        registry.size_of(type_name),
        registry.field(type_name, field_name),
    ) {
        debug_assert!(
            offset <= size || field_name == crate::registry::SIZEOF_FIELD,
            "Contract violation: {}.{} at {} is outside SIZEOF {}",
            type_name,
            field_name,
            offset,
            size
        );
    }
}
