// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Decode heap objects from target memory using only contract offsets.
//!
//! Nothing here hard-codes a layout. Every offset comes from the view, and the
//! size is computed with the same `object_size` rule the runtime uses, so a
//! reader and the target cannot disagree about where an object ends.

use serde::Serialize;

use super::contract::ContractView;
use super::memory::MemoryReader;
use crate::error::ReadError;
use crate::layout::{object_size, TypeFlags};
use crate::wire::TargetEncoding;

/// Offsets an object decode needs, resolved once per view.
#[derive(Debug, Clone, Copy)]
struct Offsets {
    header_size: u32,
    sync_block: u32,
    type_pointer: u32,
    array_length: u32,
    component_size: u32,
    type_flags: u32,
    base_size: u32,
    base_type: u32,
}

/// A type descriptor as read from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub address: u64,
    pub base_size: u32,
    pub component_size: u16,
    pub flags: u16,
    pub base_type: u64,
}

impl TypeInfo {
    pub fn is_array(&self) -> bool {
        TypeFlags(self.flags).contains(TypeFlags::IS_ARRAY)
    }
}

/// An object as read from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub address: u64,
    pub sync_block: u32,
    pub ty: TypeInfo,
    /// Present for types with a nonzero component size.
    pub array_length: Option<u32>,
    /// Total size, ObjHeader included.
    pub size: u64,
}

/// Object decoder bound to one contract.
#[derive(Debug, Clone, Copy)]
pub struct ObjectReader {
    enc: TargetEncoding,
    offsets: Offsets,
}

impl ObjectReader {
    /// Resolve the offsets this decoder needs. A missing entry means the
    /// target did not publish enough to decode objects.
    pub fn new(view: &ContractView) -> Result<Self, ReadError> {
        Ok(Self {
            enc: view.encoding,
            offsets: Offsets {
                header_size: view.require("ObjHeader", "SIZEOF")?,
                sync_block: view.require("ObjHeader", "m_uSyncBlockValue")?,
                type_pointer: view.require("Object", "m_pEEType")?,
                array_length: view.require("Array", "m_Length")?,
                component_size: view.require("EEType", "m_usComponentSize")?,
                type_flags: view.require("EEType", "m_usFlags")?,
                base_size: view.require("EEType", "m_uBaseSize")?,
                base_type: view.require("EEType", "m_pBaseType")?,
            },
        })
    }

    pub fn read_type<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
    ) -> Result<TypeInfo, ReadError> {
        let o = &self.offsets;
        Ok(TypeInfo {
            address,
            component_size: self.u16_at(mem, address + u64::from(o.component_size))?,
            flags: self.u16_at(mem, address + u64::from(o.type_flags))?,
            base_size: self.u32_at(mem, address + u64::from(o.base_size))?,
            base_type: self.ptr_at(mem, address + u64::from(o.base_type))?,
        })
    }

    /// Decode the object at `address` (the type pointer, not the ObjHeader).
    pub fn read_object<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
    ) -> Result<ObjectInfo, ReadError> {
        let o = &self.offsets;
        let header_start = address
            .checked_sub(u64::from(o.header_size))
            .ok_or(ReadError::UntypedObject { address })?;
        let sync_block = self.u32_at(mem, header_start + u64::from(o.sync_block))?;

        let type_address = self.ptr_at(mem, address + u64::from(o.type_pointer))?;
        if type_address == 0 {
            return Err(ReadError::UntypedObject { address });
        }
        let ty = self.read_type(mem, type_address)?;

        let array_length = if ty.component_size > 0 {
            Some(self.u32_at(mem, address + u64::from(o.array_length))?)
        } else {
            None
        };
        let size = object_size(ty.base_size, ty.component_size, array_length.unwrap_or(0));

        Ok(ObjectInfo {
            address,
            sync_block,
            ty,
            array_length,
            size,
        })
    }

    /// Read `len` bytes (at most 8) into the front of a zeroed buffer.
    fn fetch<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
        len: usize,
    ) -> Result<[u8; 8], ReadError> {
        let mut buf = [0u8; 8];
        mem.read_at(address, &mut buf[..len])
            .map_err(|source| ReadError::Memory {
                address,
                len,
                source,
            })?;
        Ok(buf)
    }

    fn u16_at<M: MemoryReader + ?Sized>(&self, mem: &M, address: u64) -> Result<u16, ReadError> {
        let buf = self.fetch(mem, address, 2)?;
        self.enc
            .get_u16(&buf, 0)
            .map_err(|source| ReadError::Decode { address, source })
    }

    fn u32_at<M: MemoryReader + ?Sized>(&self, mem: &M, address: u64) -> Result<u32, ReadError> {
        let buf = self.fetch(mem, address, 4)?;
        self.enc
            .get_u32(&buf, 0)
            .map_err(|source| ReadError::Decode { address, source })
    }

    fn ptr_at<M: MemoryReader + ?Sized>(&self, mem: &M, address: u64) -> Result<u64, ReadError> {
        let buf = self.fetch(mem, address, self.enc.pointer_size())?;
        self.enc
            .get_ptr(&buf, 0)
            .map_err(|source| ReadError::Decode { address, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ObjectShape, TypeDescriptor};
    use crate::reader::{ContractReader, RegionMemory};
    use crate::registry::{populate, Registry, RuntimeGlobals};
    use crate::wire::{encode_object, encode_type_descriptor, ImagePlan, MemoryImage};

    fn fixture(enc: TargetEncoding, length: u32) -> (RegionMemory, u64, TypeDescriptor) {
        let shape = ObjectShape::new(enc.pointer_width);
        let mut reg = Registry::new();
        populate(&mut reg, &shape, &RuntimeGlobals::new(), &[]);
        let (contract, _) = ImagePlan::new(&reg, enc, true).encode(0x1000).unwrap();

        let ty = TypeDescriptor::array(shape.array_base_size(), 4);
        let type_bytes = encode_type_descriptor(enc, &ty, 0, 0x55).unwrap();
        let object_bytes = encode_object(enc, &ty, 0x8000, 0x0400_0000, length).unwrap();
        let object_address = 0x9000 + u64::from(shape.header_size());

        let mem = RegionMemory::new()
            .with(contract)
            .unwrap()
            .with(MemoryImage::new(0x8000, type_bytes))
            .unwrap()
            .with(MemoryImage::new(0x9000, object_bytes))
            .unwrap();
        (mem, object_address, ty)
    }

    #[test]
    fn test_read_array_every_encoding() {
        for enc in TargetEncoding::ALL {
            let (mem, address, ty) = fixture(enc, 5);
            let view = ContractReader::new().read(&mem, 0x1000).unwrap().unwrap();
            let reader = ObjectReader::new(&view).unwrap();
            let obj = reader.read_object(&mem, address).unwrap();

            assert_eq!(obj.sync_block, 0x0400_0000);
            assert_eq!(obj.ty.address, 0x8000);
            assert!(obj.ty.is_array());
            assert_eq!(obj.array_length, Some(5));
            assert_eq!(obj.size, object_size(ty.base_size, 4, 5));
        }
    }

    #[test]
    fn test_incomplete_contract_cannot_decode_objects() {
        let mut reg = Registry::new();
        reg.register_size("Object", 8);
        let (mem, _) = ImagePlan::new(&reg, TargetEncoding::host(), true)
            .encode(0x1000)
            .unwrap();
        let view = ContractReader::new().read(&mem, 0x1000).unwrap().unwrap();
        assert!(matches!(
            ObjectReader::new(&view),
            Err(ReadError::MissingEntry { .. })
        ));
    }

    #[test]
    fn test_null_type_pointer() {
        let enc = TargetEncoding::host();
        let (mut mem, address, _) = fixture(enc, 1);
        let mut regions = std::mem::take(&mut mem).into_regions();
        let object = regions.iter_mut().find(|r| r.base == 0x9000).unwrap();
        let header = enc.pointer_size();
        object.bytes[header..header + enc.pointer_size()].fill(0);
        let mut mem = RegionMemory::new();
        for region in regions {
            mem.map(region).unwrap();
        }

        let view = ContractReader::new().read(&mem, 0x1000).unwrap().unwrap();
        let err = ObjectReader::new(&view)
            .unwrap()
            .read_object(&mem, address)
            .unwrap_err();
        assert!(matches!(err, ReadError::UntypedObject { .. }));
    }
}
