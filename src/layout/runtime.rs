// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Layouts of the runtime structures a debugger walks once it has the
//! globals: the thread list, the collector's DAC view and the stress log.
//!
//! Fields are placed the way a C compiler places them. Each one goes at the
//! next offset aligned to its own size, and the struct is padded to its
//! widest member. 64-bit integers are 8-aligned on every target.
//!
//! ```text
//!  g_pTheRuntimeInstance ─► RuntimeInstance.m_pThreadStore
//!                              └─► ThreadStore.m_ThreadList
//!                                     └─► ThreadBuffer ─m_pNext─► ThreadBuffer ─► null
//! ```

use super::ObjectShape;
use crate::wire::align_up;

/// Bytes in one stress log chunk's message buffer.
pub const STRESS_LOG_CHUNK_SIZE: u32 = 32 * 1024;

/// Finalization queue segments that follow the per-generation ones.
pub const FINALIZE_EXTRA_SEG_COUNT: u32 = 2;

/// Lays out one struct field by field.
struct Packer {
    at: u32,
    align: u32,
    w: u32,
}

impl Packer {
    fn new(shape: &ObjectShape) -> Self {
        Self {
            at: 0,
            align: 1,
            w: shape.width().bytes() as u32,
        }
    }

    fn place(&mut self, size: u32, align: u32) -> u32 {
        let offset = align_up(self.at as usize, align as usize) as u32;
        self.at = offset + size;
        self.align = self.align.max(align);
        offset
    }

    fn pointer(&mut self) -> u32 {
        self.place(self.w, self.w)
    }

    fn byte(&mut self) -> u32 {
        self.place(1, 1)
    }

    fn u32(&mut self) -> u32 {
        self.place(4, 4)
    }

    fn u64(&mut self) -> u32 {
        self.place(8, 8)
    }

    fn finish(&self) -> u32 {
        align_up(self.at as usize, self.align as usize) as u32
    }
}

/// `gc_alloc_context`: a thread's bump allocation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocContextLayout {
    pub size: u32,
    pub align: u32,
    pub alloc_ptr: u32,
    pub alloc_limit: u32,
    pub alloc_bytes: u32,
    pub alloc_bytes_uoh: u32,
    pub alloc_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeInstanceLayout {
    pub size: u32,
    pub thread_store: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStoreLayout {
    pub size: u32,
    /// Head of the singly linked `ThreadBuffer` list.
    pub thread_list: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBufferLayout {
    pub size: u32,
    pub alloc_context: u32,
    pub state_flags: u32,
    pub next: u32,
    pub thread_id: u32,
    pub stress_log: u32,
}

/// `GcDacVars`: the collector's table of pointers for out-of-process readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcDacVarsLayout {
    pub size: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub generation_size: u32,
    pub total_generation_count: u32,
    pub built_with_svr: u32,
    pub finalize_queue: u32,
    pub generation_table: u32,
    pub ephemeral_heap_segment: u32,
    pub alloc_allocated: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLayout {
    pub size: u32,
    pub allocation_context: u32,
    pub start_segment: u32,
    pub allocation_start: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSegmentLayout {
    pub size: u32,
    pub allocated: u32,
    pub committed: u32,
    pub reserved: u32,
    pub used: u32,
    pub mem: u32,
    pub flags: u32,
    pub next: u32,
    pub background_allocated: u32,
    pub heap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressLogLayout {
    pub size: u32,
    pub facilities_to_log: u32,
    pub level_to_log: u32,
    pub total_chunk: u32,
    pub logs: u32,
    pub tick_frequency: u32,
    pub start_time_stamp: u32,
    pub start_time: u32,
    pub module_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStressLogLayout {
    pub size: u32,
    pub next: u32,
    pub thread_id: u32,
    pub is_dead: u32,
    pub read_has_wrapped: u32,
    pub write_has_wrapped: u32,
    pub cur_ptr: u32,
    pub read_ptr: u32,
    pub chunk_list_head: u32,
    pub chunk_list_tail: u32,
    pub cur_read_chunk: u32,
    pub cur_write_chunk: u32,
    pub chunk_list_length: u32,
    pub thread: u32,
    pub orig_cur_ptr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressLogChunkLayout {
    pub size: u32,
    pub prev: u32,
    pub next: u32,
    pub buf: u32,
    pub sig1: u32,
    pub sig2: u32,
}

/// `StressMsg`: fixed prefix, then a trailing array of pointer-sized args.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressMsgLayout {
    pub size: u32,
    pub fmt_offs_c_args: u32,
    pub facility: u32,
    pub time_stamp: u32,
    pub args: u32,
}

impl ObjectShape {
    pub fn alloc_context(&self) -> AllocContextLayout {
        let mut p = Packer::new(self);
        let alloc_ptr = p.pointer();
        let alloc_limit = p.pointer();
        let alloc_bytes = p.u64();
        let alloc_bytes_uoh = p.u64();
        // gc_reserved_1, gc_reserved_2
        p.pointer();
        p.pointer();
        let alloc_count = p.u32();
        AllocContextLayout {
            size: p.finish(),
            align: p.align,
            alloc_ptr,
            alloc_limit,
            alloc_bytes,
            alloc_bytes_uoh,
            alloc_count,
        }
    }

    pub fn runtime_instance(&self) -> RuntimeInstanceLayout {
        let mut p = Packer::new(self);
        let thread_store = p.pointer();
        // m_hPalInstance, m_pUnboxingStubsRegion
        p.pointer();
        p.pointer();
        RuntimeInstanceLayout {
            size: p.finish(),
            thread_store,
        }
    }

    pub fn thread_store(&self) -> ThreadStoreLayout {
        let mut p = Packer::new(self);
        let thread_list = p.pointer();
        // m_pRuntimeInstance, m_Lock
        p.pointer();
        p.pointer();
        ThreadStoreLayout {
            size: p.finish(),
            thread_list,
        }
    }

    pub fn thread_buffer(&self) -> ThreadBufferLayout {
        let ctx = self.alloc_context();
        let mut p = Packer::new(self);
        let alloc_context = p.place(ctx.size, ctx.align);
        let state_flags = p.u32();
        // m_pTransitionFrame
        p.pointer();
        let next = p.pointer();
        let thread_id = p.place(self.thread_id_size(), self.thread_id_size());
        let stress_log = p.pointer();
        ThreadBufferLayout {
            size: p.finish(),
            alloc_context,
            state_flags,
            next,
            thread_id,
            stress_log,
        }
    }

    /// `sizeof(EEThreadID)`: one pointer-sized fiber id.
    pub fn thread_id_size(&self) -> u32 {
        self.width().bytes() as u32
    }

    pub fn gc_dac_vars(&self) -> GcDacVarsLayout {
        let mut p = Packer::new(self);
        GcDacVarsLayout {
            major_version: p.byte(),
            minor_version: p.byte(),
            generation_size: p.pointer(),
            total_generation_count: p.pointer(),
            built_with_svr: p.pointer(),
            finalize_queue: p.pointer(),
            generation_table: p.pointer(),
            ephemeral_heap_segment: p.pointer(),
            alloc_allocated: p.pointer(),
            size: p.finish(),
        }
    }

    pub fn generation(&self) -> GenerationLayout {
        let ctx = self.alloc_context();
        let mut p = Packer::new(self);
        GenerationLayout {
            allocation_context: p.place(ctx.size, ctx.align),
            start_segment: p.pointer(),
            allocation_start: p.pointer(),
            size: p.finish(),
        }
    }

    pub fn heap_segment(&self) -> HeapSegmentLayout {
        let mut p = Packer::new(self);
        HeapSegmentLayout {
            allocated: p.pointer(),
            committed: p.pointer(),
            reserved: p.pointer(),
            used: p.pointer(),
            mem: p.pointer(),
            flags: p.pointer(),
            next: p.pointer(),
            background_allocated: p.pointer(),
            heap: p.pointer(),
            size: p.finish(),
        }
    }

    pub fn stress_log(&self) -> StressLogLayout {
        let mut p = Packer::new(self);
        let facilities_to_log = p.u32();
        let level_to_log = p.u32();
        // MaxSizePerThread, MaxSizeTotal
        p.u32();
        p.u32();
        StressLogLayout {
            facilities_to_log,
            level_to_log,
            total_chunk: p.u32(),
            logs: p.pointer(),
            tick_frequency: p.u64(),
            start_time_stamp: p.u64(),
            start_time: p.u64(),
            module_offset: p.pointer(),
            size: p.finish(),
        }
    }

    pub fn thread_stress_log(&self) -> ThreadStressLogLayout {
        let mut p = Packer::new(self);
        ThreadStressLogLayout {
            next: p.pointer(),
            thread_id: p.u64(),
            is_dead: p.byte(),
            read_has_wrapped: p.byte(),
            write_has_wrapped: p.byte(),
            cur_ptr: p.pointer(),
            read_ptr: p.pointer(),
            chunk_list_head: p.pointer(),
            chunk_list_tail: p.pointer(),
            cur_read_chunk: p.pointer(),
            cur_write_chunk: p.pointer(),
            chunk_list_length: p.u32(),
            thread: p.pointer(),
            orig_cur_ptr: p.pointer(),
            size: p.finish(),
        }
    }

    pub fn stress_log_chunk(&self) -> StressLogChunkLayout {
        let mut p = Packer::new(self);
        StressLogChunkLayout {
            prev: p.pointer(),
            next: p.pointer(),
            buf: p.place(STRESS_LOG_CHUNK_SIZE, 1),
            sig1: p.u32(),
            sig2: p.u32(),
            size: p.finish(),
        }
    }

    pub fn stress_msg(&self) -> StressMsgLayout {
        let mut p = Packer::new(self);
        StressMsgLayout {
            fmt_offs_c_args: p.u32(),
            facility: p.u32(),
            time_stamp: p.u64(),
            args: p.place(0, self.width().bytes() as u32),
            size: p.finish(),
        }
    }
}
