// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Byte offsets of heap objects and type descriptors for a given pointer width.
//!
//! `ObjectShape` is the single source of truth for where fields live. The
//! registry publishes these offsets, the wire layer encodes fixtures with them,
//! and the in-process object model uses them for `array_data`. If two of those
//! ever disagreed, a debugger would decode garbage.
//!
//! ```text
//!            ┌──────────────────────┐
//!  obj - w   │ ObjHeader            │  w bytes; sync block word is the last 4
//!            ├──────────────────────┤
//!  obj + 0   │ type pointer         │  w bytes (Object.m_pEEType)
//!            ├──────────────────────┤
//!  obj + w   │ length (arrays only) │  u32 (Array.m_Length), padded to w
//!            ├──────────────────────┤
//!            │ elements / fields    │
//!            └──────────────────────┘
//! ```
//!
//! Base sizes include the ObjHeader, so the first array element sits at
//! `obj + base_size - header_size`.

use crate::wire::{align_up, PointerWidth};

/// Offsets for one target pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectShape {
    width: PointerWidth,
}

impl ObjectShape {
    pub const fn new(width: PointerWidth) -> Self {
        Self { width }
    }

    pub const fn host() -> Self {
        Self::new(PointerWidth::host())
    }

    pub const fn width(&self) -> PointerWidth {
        self.width
    }

    #[inline]
    fn w(&self) -> u32 {
        self.width.bytes() as u32
    }

    // ------------------------------------------------------------------
    // ObjHeader
    // ------------------------------------------------------------------

    /// Size of the ObjHeader that precedes every object.
    pub fn header_size(&self) -> u32 {
        self.w()
    }

    /// Offset of the 32-bit sync block word inside the ObjHeader.
    pub fn sync_block_offset(&self) -> u32 {
        self.w() - 4
    }

    // ------------------------------------------------------------------
    // Object / Array
    // ------------------------------------------------------------------

    pub fn type_pointer_offset(&self) -> u32 {
        0
    }

    /// `sizeof(Object)`: just the type pointer.
    pub fn object_size(&self) -> u32 {
        self.w()
    }

    pub fn array_length_offset(&self) -> u32 {
        self.w()
    }

    /// `sizeof(Array)`: type pointer plus length, padded to pointer alignment.
    pub fn array_size(&self) -> u32 {
        align_up(self.w() as usize + 4, self.w() as usize) as u32
    }

    /// Base size of an array type: ObjHeader plus the array prefix.
    pub fn array_base_size(&self) -> u32 {
        self.header_size() + self.array_size()
    }

    /// Smallest allocation the collector hands out (header, type pointer, one slot).
    pub fn min_object_size(&self) -> u32 {
        3 * self.w()
    }

    // ------------------------------------------------------------------
    // Type descriptor (EEType)
    // ------------------------------------------------------------------

    pub fn component_size_offset(&self) -> u32 {
        0
    }

    pub fn type_flags_offset(&self) -> u32 {
        2
    }

    pub fn base_size_offset(&self) -> u32 {
        4
    }

    pub fn base_type_offset(&self) -> u32 {
        8
    }

    pub fn num_vtable_slots_offset(&self) -> u32 {
        8 + self.w()
    }

    pub fn num_interfaces_offset(&self) -> u32 {
        10 + self.w()
    }

    pub fn hash_code_offset(&self) -> u32 {
        12 + self.w()
    }

    pub fn vtable_offset(&self) -> u32 {
        16 + self.w()
    }

    /// `sizeof(EEType)` without the trailing vtable slots.
    pub fn type_descriptor_size(&self) -> u32 {
        16 + self.w()
    }
}

impl Default for ObjectShape {
    fn default() -> Self {
        Self::host()
    }
}
