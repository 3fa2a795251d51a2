// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Target-encoded heap objects, type descriptors and thread list nodes.
//!
//! The runtime's allocator owns real objects; these encoders produce the same
//! bytes for demo dumps and reader tests, using the offsets from `ObjectShape`.

use std::io;

use super::encoding::TargetEncoding;
use crate::layout::{object_size, ObjectShape, TypeDescriptor};

/// Encode a type descriptor (without vtable slots).
pub fn encode_type_descriptor(
    enc: TargetEncoding,
    ty: &TypeDescriptor,
    base_type: u64,
    hash_code: u32,
) -> io::Result<Vec<u8>> {
    let shape = ObjectShape::new(enc.pointer_width);
    let mut out = vec![0u8; shape.type_descriptor_size() as usize];
    enc.put_u16(&mut out, shape.component_size_offset() as usize, ty.component_size)?;
    enc.put_u16(&mut out, shape.type_flags_offset() as usize, ty.flags.0)?;
    enc.put_u32(&mut out, shape.base_size_offset() as usize, ty.base_size)?;
    enc.put_ptr(&mut out, shape.base_type_offset() as usize, base_type)?;
    enc.put_u32(&mut out, shape.hash_code_offset() as usize, hash_code)?;
    Ok(out)
}

/// Encode a whole object, ObjHeader first.
///
/// The object address is `start + header_size`, where `start` is wherever the
/// returned bytes get placed. Element payload is left zeroed.
pub fn encode_object(
    enc: TargetEncoding,
    ty: &TypeDescriptor,
    type_address: u64,
    sync_block: u32,
    array_length: u32,
) -> io::Result<Vec<u8>> {
    let shape = ObjectShape::new(enc.pointer_width);
    let size = object_size(ty.base_size, ty.component_size, array_length);
    let size = usize::try_from(size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "object too large"))?;
    let header = shape.header_size() as usize;
    let mut out = vec![0u8; size.max(shape.min_object_size() as usize)];

    enc.put_u32(&mut out, shape.sync_block_offset() as usize, sync_block)?;
    enc.put_ptr(&mut out, header + shape.type_pointer_offset() as usize, type_address)?;
    if ty.component_size > 0 {
        enc.put_u32(&mut out, header + shape.array_length_offset() as usize, array_length)?;
    }
    Ok(out)
}

/// Encode a runtime instance pointing at `thread_store`.
pub fn encode_runtime_instance(enc: TargetEncoding, thread_store: u64) -> io::Result<Vec<u8>> {
    let layout = ObjectShape::new(enc.pointer_width).runtime_instance();
    let mut out = vec![0u8; layout.size as usize];
    enc.put_ptr(&mut out, layout.thread_store as usize, thread_store)?;
    Ok(out)
}

/// Encode a thread store whose list starts at `thread_list` (0 = empty).
pub fn encode_thread_store(enc: TargetEncoding, thread_list: u64) -> io::Result<Vec<u8>> {
    let layout = ObjectShape::new(enc.pointer_width).thread_store();
    let mut out = vec![0u8; layout.size as usize];
    enc.put_ptr(&mut out, layout.thread_list as usize, thread_list)?;
    Ok(out)
}

/// Encode one `ThreadBuffer` with an empty allocation context.
pub fn encode_thread_buffer(
    enc: TargetEncoding,
    next: u64,
    thread_id: u64,
    stress_log: u64,
) -> io::Result<Vec<u8>> {
    let layout = ObjectShape::new(enc.pointer_width).thread_buffer();
    let mut out = vec![0u8; layout.size as usize];
    enc.put_ptr(&mut out, layout.next as usize, next)?;
    // EEThreadID.m_FiberPtrId is at offset 0
    enc.put_ptr(&mut out, layout.thread_id as usize, thread_id)?;
    enc.put_ptr(&mut out, layout.stress_log as usize, stress_log)?;
    Ok(out)
}
