// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Object layout: the memory shape every heap allocation follows.
//!
//! `shape` is pure arithmetic: given a pointer width, where does each field
//! live. `runtime` extends it to the thread, collector and stress log
//! structures. `object` is the live model: atomic header bits, a set-once
//! type pointer, and the size rule.

mod object;
mod runtime;
mod shape;

pub use object::{
    object_size, HeapObject, ObjHeader, TypeDescriptor, TypeFlags, BIT_SBLK_FINALIZER_RUN,
    BIT_SBLK_GC_RESERVE, BIT_SBLK_IS_HASHCODE, BIT_SBLK_IS_HASH_OR_SYNCBLKINDEX,
    BIT_SBLK_SPIN_LOCK,
};
pub use runtime::{
    AllocContextLayout, GcDacVarsLayout, GenerationLayout, HeapSegmentLayout,
    RuntimeInstanceLayout, StressLogChunkLayout, StressLogLayout, StressMsgLayout,
    ThreadBufferLayout, ThreadStoreLayout, ThreadStressLogLayout, FINALIZE_EXTRA_SEG_COUNT,
    STRESS_LOG_CHUNK_SIZE,
};
pub use shape::ObjectShape;
