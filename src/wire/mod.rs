// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Wire layer: the contract as bytes in a target's encoding.

mod encoding;
mod image;
mod object;

pub use encoding::{
    align_up, get_u16_le, get_u32_le, get_u64_le, Endianness, PointerWidth, TargetEncoding,
};
pub use image::{global_entry_size, type_entry_size, ImagePlan, MemoryImage};
pub use object::{
    encode_object, encode_runtime_instance, encode_thread_buffer, encode_thread_store,
    encode_type_descriptor,
};
