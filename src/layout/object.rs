// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! In-process object model: header bits, type pointer, array length, size.
//!
//! These are the primitives the allocator and collector use on live objects.
//! A debugger reading the same object out of process goes through
//! `reader::ObjectReader`, which applies the same `object_size` rule to bytes
//! fetched with offsets from the contract.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use log::error;

use super::shape::ObjectShape;
use crate::contracts::check_component_size;
use crate::error::LayoutError;

// ============================================================================
// SYNC BLOCK BITS
// ============================================================================

/// Set once the finalizer for the object has run.
pub const BIT_SBLK_FINALIZER_RUN: u32 = 0x4000_0000;
/// Reserved for the collector's own marking.
pub const BIT_SBLK_GC_RESERVE: u32 = 0x2000_0000;
/// Thin-lock spin bit.
pub const BIT_SBLK_SPIN_LOCK: u32 = 0x1000_0000;
/// The low bits hold either a hash code or a sync block index.
pub const BIT_SBLK_IS_HASH_OR_SYNCBLKINDEX: u32 = 0x0800_0000;
/// Together with the bit above: the low bits are a hash code.
pub const BIT_SBLK_IS_HASHCODE: u32 = 0x0400_0000;

// ============================================================================
// TYPE DESCRIPTOR
// ============================================================================

/// Type descriptor flags (`m_usFlags`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeFlags(pub u16);

impl TypeFlags {
    pub const IS_ARRAY: u16 = 0x0008;
    pub const IS_STRING: u16 = 0x0010;
    pub const HAS_POINTERS: u16 = 0x0020;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, bit: u16) -> Self {
        Self(self.0 | bit)
    }

    pub const fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }
}

/// The parts of a type descriptor the object model reads.
///
/// The type loader owns these; the object model only borrows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub base_size: u32,
    pub component_size: u16,
    pub flags: TypeFlags,
}

impl TypeDescriptor {
    /// A fixed-size type.
    pub const fn fixed(base_size: u32) -> Self {
        Self {
            base_size,
            component_size: 0,
            flags: TypeFlags::empty(),
        }
    }

    /// An array type with `component_size`-byte elements.
    pub const fn array(base_size: u32, component_size: u16) -> Self {
        Self {
            base_size,
            component_size,
            flags: TypeFlags(TypeFlags::IS_ARRAY),
        }
    }

    /// A string-like type: variable length, 2-byte characters, not an array.
    pub const fn string(base_size: u32) -> Self {
        Self {
            base_size,
            component_size: 2,
            flags: TypeFlags(TypeFlags::IS_STRING),
        }
    }

    pub const fn is_array(&self) -> bool {
        self.flags.contains(TypeFlags::IS_ARRAY)
    }

    /// Reject descriptors that break the component size rule.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.component_size > 2 && !self.is_array() {
            return Err(LayoutError::ComponentSizeOutOfRange {
                component_size: self.component_size,
            });
        }
        Ok(())
    }
}

/// Size in bytes of an object: `base + length * component`.
///
/// `length` is ignored when `component_size` is zero. Computed in `u64` so the
/// largest array (`u32::MAX` elements of `u16::MAX` bytes) cannot overflow.
#[inline]
pub fn object_size(base_size: u32, component_size: u16, length: u32) -> u64 {
    let mut size = u64::from(base_size);
    if component_size > 0 {
        size += u64::from(length) * u64::from(component_size);
    }
    size
}

// ============================================================================
// OBJECT HEADER
// ============================================================================

/// The per-object sync block word.
///
/// Mutator threads flip bits here without any higher-level lock, so every
/// update is a single atomic read-modify-write.
#[derive(Default)]
pub struct ObjHeader {
    sync_block: AtomicU32,
}

impl ObjHeader {
    pub const fn new() -> Self {
        Self {
            sync_block: AtomicU32::new(0),
        }
    }

    pub const fn with_bits(bits: u32) -> Self {
        Self {
            sync_block: AtomicU32::new(bits),
        }
    }

    pub fn load(&self) -> u32 {
        self.sync_block.load(Ordering::Acquire)
    }

    /// Atomically OR `mask` into the word. Returns the previous value.
    pub fn set_bit(&self, mask: u32) -> u32 {
        self.sync_block.fetch_or(mask, Ordering::AcqRel)
    }

    /// Atomically clear `mask` from the word. Returns the previous value.
    pub fn clear_bit(&self, mask: u32) -> u32 {
        self.sync_block.fetch_and(!mask, Ordering::AcqRel)
    }

    pub fn is_set(&self, mask: u32) -> bool {
        self.load() & mask == mask
    }
}

impl fmt::Debug for ObjHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjHeader({:#010x})", self.load())
    }
}

// ============================================================================
// HEAP OBJECT
// ============================================================================

/// A heap allocation as the object model sees it.
///
/// `address` is the object address (just past the ObjHeader). The type pointer
/// starts out unset and may be set exactly once; the array length is a plain
/// field the allocator writes once after choosing the allocation size.
#[derive(Debug)]
pub struct HeapObject<'t> {
    header: ObjHeader,
    ty: Option<&'t TypeDescriptor>,
    length: u32,
    address: u64,
    shape: ObjectShape,
}

impl<'t> HeapObject<'t> {
    /// A freshly allocated, untyped object at `address` in the host layout.
    pub fn new(address: u64) -> Self {
        Self::with_shape(address, ObjectShape::host())
    }

    pub fn with_shape(address: u64, shape: ObjectShape) -> Self {
        Self {
            header: ObjHeader::new(),
            ty: None,
            length: 0,
            address,
            shape,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn header(&self) -> &ObjHeader {
        &self.header
    }

    pub fn ty(&self) -> Option<&'t TypeDescriptor> {
        self.ty
    }

    /// Set the type pointer. Only valid on an untyped object.
    ///
    /// A second call is a caller bug. The object keeps its original type and
    /// the violation is reported as `LayoutError::TypeAlreadySet`.
    pub fn init_type(&mut self, ty: &'t TypeDescriptor) -> Result<(), LayoutError> {
        if self.ty.is_some() {
            error!(
                "type pointer of object at {:#x} is already set; refusing to overwrite",
                self.address
            );
            return Err(LayoutError::TypeAlreadySet {
                address: self.address,
            });
        }
        self.ty = Some(ty);
        Ok(())
    }

    /// Record the element count. No bounds checking; the allocator owns
    /// consistency between length, component size, and allocation size.
    pub fn init_array_length(&mut self, length: u32) {
        self.length = length;
    }

    pub fn array_length(&self) -> u32 {
        self.length
    }

    /// Total byte size of the object, ObjHeader included.
    pub fn size(&self) -> Result<u64, LayoutError> {
        let ty = self.typed()?;
        check_component_size(ty);
        Ok(object_size(ty.base_size, ty.component_size, self.length))
    }

    /// Address of the first element.
    pub fn array_data(&self) -> Result<u64, LayoutError> {
        let ty = self.typed()?;
        self.address
            .checked_add(u64::from(ty.base_size))
            .and_then(|end| end.checked_sub(u64::from(self.shape.header_size())))
            .ok_or(LayoutError::AddressOverflow {
                address: self.address,
                base_size: ty.base_size,
            })
    }

    fn typed(&self) -> Result<&'t TypeDescriptor, LayoutError> {
        self.ty.ok_or(LayoutError::TypeNotSet {
            address: self.address,
        })
    }
}
