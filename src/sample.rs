// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! A small demo heap, and a snapshot that pairs it with a published contract.
//!
//! `rtdbg dump` writes one of these so `inspect` has real objects to decode
//! without attaching to a live runtime.
//!
//! ```text
//! base                      base + CONTRACT_OFFSET
//!  │                          │
//!  ▼                          ▼
//!  ┌──────────────────────┐   ┌──────────────────────────┐
//!  │ type descriptors (3) │   │ header │ types │ globals │ │
//!  │ objects (3)          │   │        │       │ strings │ │
//!  │ runtime instance     │   └──────────────────────────┘
//!  │ thread store         │
//!  │ threads (2)          │
//!  └──────────────────────┘
//! ```

use std::io;

use log::debug;

use crate::context::{ContractContext, Placement};
use crate::error::PublishError;
use crate::layout::{ObjectShape, TypeDescriptor, TypeFlags, BIT_SBLK_IS_HASHCODE};
use crate::reader::RegionMemory;
use crate::registry::{populate, ContractSource, Registry, RuntimeGlobals};
use crate::snapshot::Snapshot;
use crate::wire::{
    align_up, encode_object, encode_runtime_instance, encode_thread_buffer, encode_thread_store,
    encode_type_descriptor, MemoryImage, TargetEncoding,
};

/// Distance from the heap base to the contract image.
pub const CONTRACT_OFFSET: u64 = 0x1_0000;

/// Elements in the sample array.
pub const SAMPLE_ARRAY_LENGTH: u32 = 5;

/// Hash code stamped into the sample array's sync block.
const SAMPLE_HASH: u32 = 0x1234;

/// OS thread ids of the sample threads, list order.
pub const SAMPLE_THREAD_IDS: [u64; 2] = [0x1A01, 0x1A02];

/// Addresses of everything in the demo heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHeap {
    pub region: MemoryImage,
    pub free_object_type: u64,
    pub array_type: u64,
    pub plain_type: u64,
    pub free_object: u64,
    pub array_object: u64,
    pub plain_object: u64,
    pub runtime_instance: u64,
    pub thread_store: u64,
    pub threads: [u64; 2],
}

impl SampleHeap {
    pub fn build(enc: TargetEncoding, base: u64) -> io::Result<Self> {
        let shape = ObjectShape::new(enc.pointer_width);
        let align = enc.pointer_size();
        let header = u64::from(shape.header_size());
        let mut bytes = Vec::new();

        let mut place = |chunk: Vec<u8>| -> u64 {
            let at = align_up(bytes.len(), align);
            bytes.resize(at, 0);
            bytes.extend_from_slice(&chunk);
            base + at as u64
        };

        // The collector's filler type: byte-sized elements cover any gap
        let free_ty = TypeDescriptor::array(shape.array_base_size(), 1);
        let array_ty = TypeDescriptor::array(shape.array_base_size(), 4);
        let plain_ty = TypeDescriptor {
            base_size: shape.min_object_size() + shape.header_size(),
            component_size: 0,
            flags: TypeFlags::empty().with(TypeFlags::HAS_POINTERS),
        };

        let free_object_type = place(encode_type_descriptor(enc, &free_ty, 0, 0)?);
        let array_type = place(encode_type_descriptor(enc, &array_ty, 0, 0xA77A)?);
        let plain_type = place(encode_type_descriptor(enc, &plain_ty, 0, 0x0B1E)?);

        let free_object = place(encode_object(enc, &free_ty, free_object_type, 0, 8)?) + header;
        let array_object = place(encode_object(
            enc,
            &array_ty,
            array_type,
            BIT_SBLK_IS_HASHCODE | SAMPLE_HASH,
            SAMPLE_ARRAY_LENGTH,
        )?) + header;
        let plain_object = place(encode_object(enc, &plain_ty, plain_type, 0, 0)?) + header;

        // Threads are placed tail first so each can point at its successor
        let second = place(encode_thread_buffer(enc, 0, SAMPLE_THREAD_IDS[1], 0)?);
        let first = place(encode_thread_buffer(enc, second, SAMPLE_THREAD_IDS[0], 0)?);
        let thread_store = place(encode_thread_store(enc, first)?);
        let runtime_instance = place(encode_runtime_instance(enc, thread_store)?);

        if bytes.len() as u64 > CONTRACT_OFFSET {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "sample heap overlaps the contract image",
            ));
        }

        Ok(Self {
            region: MemoryImage::new(base, bytes),
            free_object_type,
            array_type,
            plain_type,
            free_object,
            array_object,
            plain_object,
            runtime_instance,
            thread_store,
            threads: [first, second],
        })
    }

    /// Globals a runtime with this heap would publish.
    pub fn globals(&self) -> RuntimeGlobals {
        RuntimeGlobals::new()
            .with("g_pTheRuntimeInstance", self.runtime_instance)
            .with("g_pFreeObjectEEType", self.free_object_type)
            .with("moduleBaseAddress", self.region.base)
    }

    pub fn objects(&self) -> [u64; 3] {
        [self.free_object, self.array_object, self.plain_object]
    }
}

/// A stand-in thread manager publishing its own type.
#[derive(Debug, Default)]
pub struct SampleThreadSource;

impl ContractSource for SampleThreadSource {
    fn name(&self) -> &str {
        "thread manager"
    }

    fn contribute(&self, shape: &ObjectShape, registry: &mut Registry) {
        let w = shape.width().bytes() as u32;
        registry.register_size("Thread", 4 * w);
        registry.register_field("Thread", "m_pNext", 0);
        registry.register_field("Thread", "m_ThreadId", w);
        registry.register_field("Thread", "m_pAllocContext", 2 * w);
    }
}

/// Publish a contract for `enc` next to a demo heap at `base`, and capture both.
pub fn sample_snapshot(
    enc: TargetEncoding,
    base: u64,
    max_entries: Option<usize>,
) -> Result<Snapshot, PublishError> {
    let heap = SampleHeap::build(enc, base)?;
    let globals = heap.globals();
    let context = ContractContext::new(enc, max_entries);
    let contract = context.publish(
        |shape, registry| populate(registry, shape, &globals, &[&SampleThreadSource]),
        Placement::At(base + CONTRACT_OFFSET),
    )?;
    debug!(
        "sample heap at {:#x} ({} bytes), contract at {:#x}",
        base,
        heap.region.len(),
        contract.header_address()
    );

    let memory = RegionMemory::new()
        .with(heap.region)?
        .with(contract.to_image())?;
    Ok(Snapshot::new(contract.header_address(), memory))
}
