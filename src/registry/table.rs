// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The fixed table of facts format version 1.x exposes.
//!
//! This table *is* the format. Adding a row is a minor-version change; editing
//! or removing one is a major-version change (see `versioning`). Offsets come
//! from `ObjectShape`, so one table serves every pointer width.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::Registry;
use crate::layout::{ObjectShape, TypeFlags, FINALIZE_EXTRA_SEG_COUNT, STRESS_LOG_CHUNK_SIZE};

/// The data type behind a published offset.
///
/// Changing a field's kind is a breaking change even when its offset stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// `SIZEOF` entry.
    Size,
    Pointer,
    /// Pointer-sized integer (`size_t`).
    USize,
    U8,
    U16,
    U32,
    U64,
    /// An embedded struct or buffer.
    Inline,
    /// A define (named constant).
    Constant,
}

/// One `(type, field, offset)` row.
#[derive(Debug, Clone, Copy)]
pub struct FieldFact {
    pub type_name: &'static str,
    pub field_name: &'static str,
    pub kind: FieldKind,
    pub offset: fn(&ObjectShape) -> u32,
}

impl FieldFact {
    pub fn offset_for(&self, shape: &ObjectShape) -> u32 {
        (self.offset)(shape)
    }
}

/// One named constant.
#[derive(Debug, Clone, Copy)]
pub struct DefineFact {
    pub name: &'static str,
    pub value: fn(&ObjectShape) -> u32,
}

impl DefineFact {
    pub fn value_for(&self, shape: &ObjectShape) -> u32 {
        (self.value)(shape)
    }
}

macro_rules! field {
    ($ty:literal, $field:literal, $kind:ident, $offset:expr) => {
        FieldFact {
            type_name: $ty,
            field_name: $field,
            kind: FieldKind::$kind,
            offset: $offset,
        }
    };
}

/// Every type/field pair version 1.x promises.
pub const CONTRACT_FIELDS: &[FieldFact] = &[
    // ObjHeader precedes the object
    field!("ObjHeader", "SIZEOF", Size, ObjectShape::header_size),
    field!("ObjHeader", "m_uSyncBlockValue", U32, ObjectShape::sync_block_offset),
    // Object
    field!("Object", "SIZEOF", Size, ObjectShape::object_size),
    field!("Object", "m_pEEType", Pointer, ObjectShape::type_pointer_offset),
    // Array
    field!("Array", "SIZEOF", Size, ObjectShape::array_size),
    field!("Array", "m_Length", U32, ObjectShape::array_length_offset),
    // EEType (type descriptor)
    field!("EEType", "SIZEOF", Size, ObjectShape::type_descriptor_size),
    field!("EEType", "m_usComponentSize", U16, ObjectShape::component_size_offset),
    field!("EEType", "m_usFlags", U16, ObjectShape::type_flags_offset),
    field!("EEType", "m_uBaseSize", U32, ObjectShape::base_size_offset),
    field!("EEType", "m_pBaseType", Pointer, ObjectShape::base_type_offset),
    field!("EEType", "m_usNumVtableSlots", U16, ObjectShape::num_vtable_slots_offset),
    field!("EEType", "m_usNumInterfaces", U16, ObjectShape::num_interfaces_offset),
    field!("EEType", "m_uHashCode", U32, ObjectShape::hash_code_offset),
    field!("EEType", "m_VTable", Pointer, ObjectShape::vtable_offset),
    // Thread list: RuntimeInstance -> ThreadStore -> ThreadBuffer chain
    field!("RuntimeInstance", "SIZEOF", Size, |s| s.runtime_instance().size),
    field!("RuntimeInstance", "m_pThreadStore", Pointer, |s| s.runtime_instance().thread_store),
    field!("ThreadStore", "SIZEOF", Size, |s| s.thread_store().size),
    field!("ThreadStore", "m_ThreadList", Pointer, |s| s.thread_store().thread_list),
    field!("ThreadBuffer", "SIZEOF", Size, |s| s.thread_buffer().size),
    field!("ThreadBuffer", "m_pNext", Pointer, |s| s.thread_buffer().next),
    field!("ThreadBuffer", "m_rgbAllocContextBuffer", Inline, |s| s.thread_buffer().alloc_context),
    field!("ThreadBuffer", "m_threadId", Inline, |s| s.thread_buffer().thread_id),
    field!("ThreadBuffer", "m_pThreadStressLog", Pointer, |s| s.thread_buffer().stress_log),
    field!("EEThreadID", "SIZEOF", Size, ObjectShape::thread_id_size),
    field!("EEThreadID", "m_FiberPtrId", Pointer, |_| 0),
    // Collector state
    field!("GcDacVars", "SIZEOF", Size, |s| s.gc_dac_vars().size),
    field!("GcDacVars", "major_version_number", U8, |s| s.gc_dac_vars().major_version),
    field!("GcDacVars", "minor_version_number", U8, |s| s.gc_dac_vars().minor_version),
    field!("GcDacVars", "generation_size", USize, |s| s.gc_dac_vars().generation_size),
    field!("GcDacVars", "total_generation_count", USize, |s| s.gc_dac_vars().total_generation_count),
    field!("GcDacVars", "built_with_svr", Pointer, |s| s.gc_dac_vars().built_with_svr),
    field!("GcDacVars", "finalize_queue", Pointer, |s| s.gc_dac_vars().finalize_queue),
    field!("GcDacVars", "generation_table", Pointer, |s| s.gc_dac_vars().generation_table),
    field!("GcDacVars", "ephemeral_heap_segment", Pointer, |s| s.gc_dac_vars().ephemeral_heap_segment),
    field!("GcDacVars", "alloc_allocated", Pointer, |s| s.gc_dac_vars().alloc_allocated),
    field!("gc_alloc_context", "SIZEOF", Size, |s| s.alloc_context().size),
    field!("gc_alloc_context", "alloc_ptr", Pointer, |s| s.alloc_context().alloc_ptr),
    field!("gc_alloc_context", "alloc_limit", Pointer, |s| s.alloc_context().alloc_limit),
    field!("gc_alloc_context", "alloc_bytes", U64, |s| s.alloc_context().alloc_bytes),
    field!("gc_alloc_context", "alloc_bytes_uoh", U64, |s| s.alloc_context().alloc_bytes_uoh),
    field!("gc_alloc_context", "alloc_count", U32, |s| s.alloc_context().alloc_count),
    field!("dac_generation", "SIZEOF", Size, |s| s.generation().size),
    field!("dac_generation", "allocation_context", Inline, |s| s.generation().allocation_context),
    field!("dac_generation", "start_segment", Pointer, |s| s.generation().start_segment),
    field!("dac_generation", "allocation_start", Pointer, |s| s.generation().allocation_start),
    field!("dac_heap_segment", "SIZEOF", Size, |s| s.heap_segment().size),
    field!("dac_heap_segment", "allocated", Pointer, |s| s.heap_segment().allocated),
    field!("dac_heap_segment", "committed", Pointer, |s| s.heap_segment().committed),
    field!("dac_heap_segment", "reserved", Pointer, |s| s.heap_segment().reserved),
    field!("dac_heap_segment", "used", Pointer, |s| s.heap_segment().used),
    field!("dac_heap_segment", "mem", Pointer, |s| s.heap_segment().mem),
    field!("dac_heap_segment", "flags", USize, |s| s.heap_segment().flags),
    field!("dac_heap_segment", "next", Pointer, |s| s.heap_segment().next),
    field!("dac_heap_segment", "background_allocated", Pointer, |s| s.heap_segment().background_allocated),
    field!("dac_heap_segment", "heap", Pointer, |s| s.heap_segment().heap),
    // Stress log
    field!("StressLog", "SIZEOF", Size, |s| s.stress_log().size),
    field!("StressLog", "facilitiesToLog", U32, |s| s.stress_log().facilities_to_log),
    field!("StressLog", "levelToLog", U32, |s| s.stress_log().level_to_log),
    field!("StressLog", "totalChunk", U32, |s| s.stress_log().total_chunk),
    field!("StressLog", "logs", Pointer, |s| s.stress_log().logs),
    field!("StressLog", "tickFrequency", U64, |s| s.stress_log().tick_frequency),
    field!("StressLog", "startTimeStamp", U64, |s| s.stress_log().start_time_stamp),
    field!("StressLog", "startTime", U64, |s| s.stress_log().start_time),
    field!("StressLog", "moduleOffset", USize, |s| s.stress_log().module_offset),
    field!("ThreadStressLog", "SIZEOF", Size, |s| s.thread_stress_log().size),
    field!("ThreadStressLog", "next", Pointer, |s| s.thread_stress_log().next),
    field!("ThreadStressLog", "threadId", U64, |s| s.thread_stress_log().thread_id),
    field!("ThreadStressLog", "isDead", U8, |s| s.thread_stress_log().is_dead),
    field!("ThreadStressLog", "readHasWrapped", U8, |s| s.thread_stress_log().read_has_wrapped),
    field!("ThreadStressLog", "writeHasWrapped", U8, |s| s.thread_stress_log().write_has_wrapped),
    field!("ThreadStressLog", "curPtr", Pointer, |s| s.thread_stress_log().cur_ptr),
    field!("ThreadStressLog", "readPtr", Pointer, |s| s.thread_stress_log().read_ptr),
    field!("ThreadStressLog", "chunkListHead", Pointer, |s| s.thread_stress_log().chunk_list_head),
    field!("ThreadStressLog", "chunkListTail", Pointer, |s| s.thread_stress_log().chunk_list_tail),
    field!("ThreadStressLog", "curReadChunk", Pointer, |s| s.thread_stress_log().cur_read_chunk),
    field!("ThreadStressLog", "curWriteChunk", Pointer, |s| s.thread_stress_log().cur_write_chunk),
    field!("ThreadStressLog", "chunkListLength", U32, |s| s.thread_stress_log().chunk_list_length),
    field!("ThreadStressLog", "pThread", Pointer, |s| s.thread_stress_log().thread),
    field!("ThreadStressLog", "origCurPtr", Pointer, |s| s.thread_stress_log().orig_cur_ptr),
    field!("StressLogChunk", "SIZEOF", Size, |s| s.stress_log_chunk().size),
    field!("StressLogChunk", "prev", Pointer, |s| s.stress_log_chunk().prev),
    field!("StressLogChunk", "next", Pointer, |s| s.stress_log_chunk().next),
    field!("StressLogChunk", "buf", Inline, |s| s.stress_log_chunk().buf),
    field!("StressLogChunk", "dwSig1", U32, |s| s.stress_log_chunk().sig1),
    field!("StressLogChunk", "dwSig2", U32, |s| s.stress_log_chunk().sig2),
    field!("StressMsg", "SIZEOF", Size, |s| s.stress_msg().size),
    field!("StressMsg", "fmtOffsCArgs", U32, |s| s.stress_msg().fmt_offs_c_args),
    field!("StressMsg", "facility", U32, |s| s.stress_msg().facility),
    field!("StressMsg", "timeStamp", U64, |s| s.stress_msg().time_stamp),
    field!("StressMsg", "args", Pointer, |s| s.stress_msg().args),
];

pub const CONTRACT_DEFINES: &[DefineFact] = &[
    DefineFact {
        name: "MinObjectSize",
        value: ObjectShape::min_object_size,
    },
    DefineFact {
        name: "ArrayBaseSize",
        value: ObjectShape::array_base_size,
    },
    DefineFact {
        name: "EETypeFlags_IsArray",
        value: |_| TypeFlags::IS_ARRAY as u32,
    },
    DefineFact {
        name: "EETypeFlags_IsString",
        value: |_| TypeFlags::IS_STRING as u32,
    },
    DefineFact {
        name: "EETypeFlags_HasPointers",
        value: |_| TypeFlags::HAS_POINTERS as u32,
    },
    DefineFact {
        name: "FinalizeExtraSegCount",
        value: |_| FINALIZE_EXTRA_SEG_COUNT,
    },
    DefineFact {
        name: "StressLogChunk_ChunkSize",
        value: |_| STRESS_LOG_CHUNK_SIZE,
    },
];

/// Globals version 1.x promises, in registration order.
pub const CONTRACT_GLOBALS: &[&str] = &[
    "g_pTheRuntimeInstance",
    "g_gcDacGlobals",
    "g_pFreeObjectEEType",
    "g_stressLog",
    "moduleBaseAddress",
];

/// Addresses of runtime globals, supplied by whoever owns them.
///
/// A name missing here is simply not published; readers treat it as unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeGlobals {
    addresses: BTreeMap<String, u64>,
}

impl RuntimeGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, address: u64) -> Self {
        self.set(name, address);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, address: u64) {
        self.addresses.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.addresses.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// A subsystem outside the core that publishes its own facts.
///
/// The collector, type loader and thread manager plug in here. Contributions
/// run after the fixed table, so a source may shadow a table entry; doing that
/// for an existing key is a breaking change and the manifest diff will say so.
pub trait ContractSource {
    fn name(&self) -> &str;

    fn contribute(&self, shape: &ObjectShape, registry: &mut Registry);
}

/// Fill `registry` with the fixed table, the globals, then each source.
pub fn populate(
    registry: &mut Registry,
    shape: &ObjectShape,
    globals: &RuntimeGlobals,
    sources: &[&dyn ContractSource],
) {
    for fact in CONTRACT_FIELDS {
        registry.register_field(fact.type_name, fact.field_name, fact.offset_for(shape));
    }
    for define in CONTRACT_DEFINES {
        registry.register_define(define.name, define.value_for(shape));
    }
    for &name in CONTRACT_GLOBALS {
        match globals.get(name) {
            Some(address) => {
                registry.register_global(name, address);
            }
            None => debug!("global '{}' not provided; leaving it out of the contract", name),
        }
    }
    for source in sources {
        let before = registry.type_count() + registry.global_count();
        source.contribute(shape, registry);
        debug!(
            "contract source '{}' added {} entries",
            source.name(),
            registry.type_count() + registry.global_count() - before
        );
    }
}
