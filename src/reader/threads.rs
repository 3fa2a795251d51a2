// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Walk the runtime's thread list using only contract offsets.
//!
//! The chain starts at the runtime instance a debugger finds through
//! `g_pTheRuntimeInstance`, goes through the thread store, then follows
//! `ThreadBuffer.m_pNext` until it hits null. The walk shares the contract
//! lists' cycle and length defences, since a torn list in a crashed process
//! looks exactly like a hostile one.

use serde::Serialize;

use super::contract::{ContractView, ListWalk};
use super::memory::MemoryReader;
use crate::error::ReadError;
use crate::wire::TargetEncoding;

/// Most threads a walk visits before giving up.
pub const DEFAULT_MAX_THREADS: usize = 16_384;

#[derive(Debug, Clone, Copy)]
struct Offsets {
    thread_store: u32,
    thread_list: u32,
    next: u32,
    thread_id: u32,
    fiber_id: u32,
    stress_log: u32,
    alloc_context: u32,
    alloc_ptr: u32,
    alloc_limit: u32,
}

/// One thread as read from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    /// Address of the `ThreadBuffer`.
    pub address: u64,
    pub thread_id: u64,
    /// The thread's stress log, or 0.
    pub stress_log: u64,
    pub alloc_ptr: u64,
    pub alloc_limit: u64,
}

/// Thread list walker bound to one contract.
#[derive(Debug, Clone, Copy)]
pub struct ThreadListReader {
    enc: TargetEncoding,
    offsets: Offsets,
    max_threads: usize,
}

impl ThreadListReader {
    pub fn new(view: &ContractView) -> Result<Self, ReadError> {
        Ok(Self {
            enc: view.encoding,
            offsets: Offsets {
                thread_store: view.require("RuntimeInstance", "m_pThreadStore")?,
                thread_list: view.require("ThreadStore", "m_ThreadList")?,
                next: view.require("ThreadBuffer", "m_pNext")?,
                thread_id: view.require("ThreadBuffer", "m_threadId")?,
                fiber_id: view.require("EEThreadID", "m_FiberPtrId")?,
                stress_log: view.require("ThreadBuffer", "m_pThreadStressLog")?,
                alloc_context: view.require("ThreadBuffer", "m_rgbAllocContextBuffer")?,
                alloc_ptr: view.require("gc_alloc_context", "alloc_ptr")?,
                alloc_limit: view.require("gc_alloc_context", "alloc_limit")?,
            },
            max_threads: DEFAULT_MAX_THREADS,
        })
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Every thread reachable from `runtime_instance`, list order.
    ///
    /// A null thread store or list head is an empty list, not an error.
    pub fn read_threads<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        runtime_instance: u64,
    ) -> Result<Vec<ThreadInfo>, ReadError> {
        let o = &self.offsets;
        let store = self.ptr_at(mem, runtime_instance, o.thread_store)?;
        if store == 0 {
            return Ok(Vec::new());
        }
        let head = self.ptr_at(mem, store, o.thread_list)?;

        let mut threads = Vec::new();
        let mut walk = ListWalk::new("thread", head, self.max_threads);
        while let Some(address) = walk.step()? {
            let thread = self.read_thread(mem, address)?;
            threads.push(thread);
            walk.advance(self.ptr_at(mem, address, o.next)?);
        }
        Ok(threads)
    }

    pub fn read_thread<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
    ) -> Result<ThreadInfo, ReadError> {
        let o = &self.offsets;
        let alloc_context = offset(address, o.alloc_context)?;
        let thread_id = offset(address, o.thread_id)?;
        Ok(ThreadInfo {
            address,
            thread_id: self.ptr_at(mem, thread_id, o.fiber_id)?,
            stress_log: self.ptr_at(mem, address, o.stress_log)?,
            alloc_ptr: self.ptr_at(mem, alloc_context, o.alloc_ptr)?,
            alloc_limit: self.ptr_at(mem, alloc_context, o.alloc_limit)?,
        })
    }

    fn ptr_at<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        base: u64,
        field: u32,
    ) -> Result<u64, ReadError> {
        let address = offset(base, field)?;
        let len = self.enc.pointer_size();
        let mut buf = [0u8; 8];
        mem.read_at(address, &mut buf[..len])
            .map_err(|source| ReadError::Memory {
                address,
                len,
                source,
            })?;
        self.enc
            .get_ptr(&buf, 0)
            .map_err(|source| ReadError::Decode { address, source })
    }
}

fn offset(base: u64, field: u32) -> Result<u64, ReadError> {
    base.checked_add(u64::from(field))
        .ok_or(ReadError::AddressOverflow { base, offset: field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ObjectShape;
    use crate::reader::{ContractReader, RegionMemory};
    use crate::registry::{populate, Registry, RuntimeGlobals};
    use crate::wire::{
        encode_runtime_instance, encode_thread_buffer, encode_thread_store, Endianness,
        ImagePlan, MemoryImage, PointerWidth,
    };

    const RUNTIME: u64 = 0x5000;
    const STORE: u64 = 0x6000;

    fn view_and_memory(enc: TargetEncoding, threads: &[(u64, u64)]) -> (ContractView, RegionMemory) {
        let shape = ObjectShape::new(enc.pointer_width);
        let mut reg = Registry::new();
        let globals = RuntimeGlobals::new().with("g_pTheRuntimeInstance", RUNTIME);
        populate(&mut reg, &shape, &globals, &[]);
        let (contract, _) = ImagePlan::new(&reg, enc, true).encode(0x1000).unwrap();

        let head = threads.first().map_or(0, |&(address, _)| address);
        let mut mem = RegionMemory::new()
            .with(contract)
            .unwrap()
            .with(MemoryImage::new(RUNTIME, encode_runtime_instance(enc, STORE).unwrap()))
            .unwrap()
            .with(MemoryImage::new(STORE, encode_thread_store(enc, head).unwrap()))
            .unwrap();
        for (i, &(address, id)) in threads.iter().enumerate() {
            let next = threads.get(i + 1).map_or(0, |&(a, _)| a);
            let bytes = encode_thread_buffer(enc, next, id, 0).unwrap();
            mem.map(MemoryImage::new(address, bytes)).unwrap();
        }
        let view = ContractReader::new().read(&mem, 0x1000).unwrap().unwrap();
        (view, mem)
    }

    #[test]
    fn test_walks_thread_chain_on_every_target() {
        for enc in TargetEncoding::ALL {
            let (view, mem) = view_and_memory(enc, &[(0x7000, 11), (0x7400, 22), (0x7800, 33)]);
            let runtime = view.global("g_pTheRuntimeInstance").unwrap();
            let threads = ThreadListReader::new(&view)
                .unwrap()
                .read_threads(&mem, runtime)
                .unwrap();
            let ids: Vec<_> = threads.iter().map(|t| (t.address, t.thread_id)).collect();
            assert_eq!(ids, vec![(0x7000, 11), (0x7400, 22), (0x7800, 33)], "{}", enc);
        }
    }

    #[test]
    fn test_empty_thread_list() {
        let enc = TargetEncoding::new(PointerWidth::Eight, Endianness::Little);
        let (view, mem) = view_and_memory(enc, &[]);
        let threads = ThreadListReader::new(&view)
            .unwrap()
            .read_threads(&mem, RUNTIME)
            .unwrap();
        assert!(threads.is_empty());
    }

    fn replace_region(mem: RegionMemory, base: u64, bytes: Vec<u8>) -> RegionMemory {
        let mut out = RegionMemory::new();
        for region in mem.into_regions() {
            if region.base != base {
                out.map(region).unwrap();
            }
        }
        out.map(MemoryImage::new(base, bytes)).unwrap();
        out
    }

    #[test]
    fn test_thread_cycle_detected() {
        let enc = TargetEncoding::new(PointerWidth::Four, Endianness::Big);
        let (view, mem) = view_and_memory(enc, &[(0x7000, 1), (0x7400, 2)]);
        // Second thread links back to the first
        let mem = replace_region(mem, 0x7400, encode_thread_buffer(enc, 0x7000, 2, 0).unwrap());
        let err = ThreadListReader::new(&view)
            .unwrap()
            .read_threads(&mem, RUNTIME)
            .unwrap_err();
        assert!(matches!(err, ReadError::ListCycle { list: "thread", .. }));
    }

    #[test]
    fn test_thread_limit() {
        let enc = TargetEncoding::host();
        let (view, mem) = view_and_memory(enc, &[(0x7000, 1), (0x7400, 2), (0x7800, 3)]);
        let err = ThreadListReader::new(&view)
            .unwrap()
            .with_max_threads(2)
            .read_threads(&mem, RUNTIME)
            .unwrap_err();
        assert!(matches!(err, ReadError::ListTooLong { limit: 2, .. }));
    }

    #[test]
    fn test_missing_layout_is_reported() {
        let enc = TargetEncoding::host();
        let mut reg = Registry::new();
        reg.register_field("RuntimeInstance", "m_pThreadStore", 0);
        let (contract, _) = ImagePlan::new(&reg, enc, true).encode(0x1000).unwrap();
        let view = ContractReader::new().read(&contract, 0x1000).unwrap().unwrap();
        let err = ThreadListReader::new(&view).unwrap_err();
        assert!(matches!(err, ReadError::MissingEntry { .. }));
    }

    #[test]
    fn test_uncaptured_thread_is_memory_error() {
        let enc = TargetEncoding::host();
        let (view, mem) = view_and_memory(enc, &[]);
        let mem = replace_region(mem, STORE, encode_thread_store(enc, 0xDEAD_0000).unwrap());
        let err = ThreadListReader::new(&view)
            .unwrap()
            .read_threads(&mem, RUNTIME)
            .unwrap_err();
        assert!(matches!(err, ReadError::Memory { .. }));
    }
}
