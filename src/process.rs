// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The live contract of the running process.
//!
//! `RTDBG_RUNTIME_DEBUG_HEADER` is an unmangled static a debugger finds by
//! symbol name (or by scanning for the cookie). Its prefix is a compile-time
//! constant for the host. Its list heads start null and are stored once,
//! with release ordering, after the lists they point at are fully written.
//! A reader that races initialization sees null heads, i.e. an empty
//! contract, never a half-built list.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::{ContractContext, Placement, PublishedContract};
use crate::error::PublishError;
use crate::header::{
    ContractHeader, ContractVersion, HeaderFlags, ListHeads, Magic, HEADER_PREFIX_SIZE,
};
use crate::reader::RegionMemory;
use crate::registry::{populate, ContractSource, RuntimeGlobals};
use crate::wire::{MemoryImage, TargetEncoding};

/// Byte-for-byte the host encoding of `ContractHeader`.
#[repr(C)]
pub struct ExportedHeader {
    prefix: [u8; HEADER_PREFIX_SIZE],
    debug_types_list: AtomicUsize,
    globals_list: AtomicUsize,
    defines_list: AtomicUsize,
}

impl ExportedHeader {
    const fn new() -> Self {
        Self {
            prefix: host_prefix(),
            debug_types_list: AtomicUsize::new(0),
            globals_list: AtomicUsize::new(0),
            defines_list: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> u64 {
        self as *const Self as usize as u64
    }

    pub fn lists(&self) -> ListHeads {
        ListHeads {
            debug_types_list: self.debug_types_list.load(Ordering::Acquire) as u64,
            globals_list: self.globals_list.load(Ordering::Acquire) as u64,
            defines_list: self.defines_list.load(Ordering::Acquire) as u64,
        }
    }

    /// The header as a reader would see it right now.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let enc = TargetEncoding::host();
        let mut out = vec![0u8; ContractHeader::size(enc.pointer_width)];
        out[..HEADER_PREFIX_SIZE].copy_from_slice(&self.prefix);
        let lists = self.lists();
        let slots = [lists.debug_types_list, lists.globals_list, lists.defines_list];
        for (i, value) in slots.into_iter().enumerate() {
            enc.put_ptr(&mut out, ContractHeader::slot_offset(enc.pointer_width, i), value)?;
        }
        Ok(out)
    }

    fn store(&self, lists: ListHeads) {
        self.debug_types_list
            .store(lists.debug_types_list as usize, Ordering::Release);
        self.globals_list
            .store(lists.globals_list as usize, Ordering::Release);
    }
}

const fn host_prefix() -> [u8; HEADER_PREFIX_SIZE] {
    let magic = Magic::LIST_HEADER.bytes();
    let major = ContractVersion::CURRENT.major.to_le_bytes();
    let minor = ContractVersion::CURRENT.minor.to_le_bytes();
    let flags = HeaderFlags::for_encoding(TargetEncoding::host())
        .bits()
        .to_le_bytes();
    [
        magic[0], magic[1], magic[2], magic[3], major[0], major[1], minor[0], minor[1], flags[0],
        flags[1], flags[2], flags[3], 0, 0, 0, 0,
    ]
}

// The only unsafe-lint exemption in the crate: the symbol must not be mangled.
#[allow(unsafe_code)]
#[no_mangle]
pub static RTDBG_RUNTIME_DEBUG_HEADER: ExportedHeader = ExportedHeader::new();

static PROCESS: ContractContext = ContractContext::new(TargetEncoding::host(), None);

/// Build and publish this process's contract. Call once, early in startup.
///
/// Registers the fixed table, every global `globals` names, then each source.
pub fn populate_debug_headers(
    globals: &RuntimeGlobals,
    sources: &[&dyn ContractSource],
) -> Result<&'static PublishedContract, PublishError> {
    let contract = PROCESS.publish(
        |shape, registry| populate(registry, shape, globals, sources),
        Placement::Leaked,
    )?;
    RTDBG_RUNTIME_DEBUG_HEADER.store(contract.lists());
    Ok(contract)
}

/// The process contract, once published.
pub fn published() -> Option<&'static PublishedContract> {
    PROCESS.published()
}

/// Address of the exported header symbol.
pub fn header_address() -> u64 {
    RTDBG_RUNTIME_DEBUG_HEADER.address()
}

/// This process's contract memory as a reader sees it: the exported header
/// plus, once published, the list image it points into.
pub fn self_memory() -> io::Result<RegionMemory> {
    let mut memory = RegionMemory::new();
    memory.map(MemoryImage::new(
        header_address(),
        RTDBG_RUNTIME_DEBUG_HEADER.to_bytes()?,
    ))?;
    if let Some(contract) = published() {
        memory.map(contract.to_image())?;
    }
    Ok(memory)
}
