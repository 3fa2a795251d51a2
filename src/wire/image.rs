// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Serialization pass: registry arena to pointer-chased memory image.
//!
//! In process the registry is an arena with index links. A debugger, though,
//! expects real linked lists: each entry holds the *address* of the next, and
//! names are addresses of NUL-terminated strings. This module lays all of that
//! out in one contiguous block for a chosen base address and target encoding.
//!
//! ```text
//! base ──► ┌─────────────────────────┐
//!          │ ContractHeader (opt.)   │  16 + 3w bytes
//!          ├─────────────────────────┤
//!          │ DebugTypeEntry × N      │  align_up(3w + 4, w) each
//!          ├─────────────────────────┤
//!          │ GlobalValueEntry × M    │  3w each
//!          ├─────────────────────────┤
//!          │ string pool             │  deduplicated, NUL-terminated
//!          └─────────────────────────┘
//! ```
//!
//! Entries are written in registration order, so entry `i`'s `next` points at
//! entry `i - 1` and the list head is the last entry written.

use std::collections::HashMap;
use std::io;

use super::encoding::{align_up, TargetEncoding};
use crate::header::{ContractHeader, ListHeads};
use crate::registry::Registry;

/// Size of one encoded `DebugTypeEntry`.
pub const fn type_entry_size(enc: TargetEncoding) -> usize {
    let w = enc.pointer_size();
    align_up(3 * w + 4, w)
}

/// Size of one encoded `GlobalValueEntry`.
pub const fn global_entry_size(enc: TargetEncoding) -> usize {
    3 * enc.pointer_size()
}

/// A block of target memory: bytes plus the address they live at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    pub base: u64,
    pub bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last address.
    pub fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    pub fn contains(&self, address: u64, len: usize) -> bool {
        address >= self.base
            && address
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.end())
    }
}

/// Precomputed layout for one registry and encoding.
#[derive(Debug)]
pub struct ImagePlan<'r> {
    registry: &'r Registry,
    enc: TargetEncoding,
    include_header: bool,
    types_offset: usize,
    globals_offset: usize,
    pool_offset: usize,
    pool: Vec<u8>,
    strings: HashMap<&'r str, usize>,
}

impl<'r> ImagePlan<'r> {
    pub fn new(registry: &'r Registry, enc: TargetEncoding, include_header: bool) -> Self {
        let header_size = if include_header {
            ContractHeader::size(enc.pointer_width)
        } else {
            0
        };
        let types_offset = header_size;
        let globals_offset = types_offset + registry.type_count() * type_entry_size(enc);
        let pool_offset = globals_offset + registry.global_count() * global_entry_size(enc);

        let mut pool = Vec::new();
        let mut strings = HashMap::new();
        let names = registry
            .type_arena()
            .iter()
            .flat_map(|e| [e.type_name(), e.field_name()])
            .chain(registry.global_arena().iter().map(|e| e.name()));
        for name in names {
            strings.entry(name).or_insert_with(|| {
                let at = pool.len();
                pool.extend_from_slice(name.as_bytes());
                pool.push(0);
                at
            });
        }

        Self {
            registry,
            enc,
            include_header,
            types_offset,
            globals_offset,
            pool_offset,
            pool,
            strings,
        }
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.enc
    }

    pub fn total_size(&self) -> usize {
        self.pool_offset + self.pool.len()
    }

    /// Bytes of distinct name storage.
    pub fn string_pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Offset of the header within the image, if one is included.
    pub fn header_offset(&self) -> Option<usize> {
        self.include_header.then_some(0)
    }

    /// Allocate and encode an image at `base`.
    pub fn encode(&self, base: u64) -> io::Result<(MemoryImage, ListHeads)> {
        let mut bytes = vec![0u8; self.total_size()];
        let heads = self.encode_into(&mut bytes, base)?;
        Ok((MemoryImage::new(base, bytes), heads))
    }

    /// Encode into `out`, which will live at address `base`.
    ///
    /// `out` must be at least `total_size()` bytes. When the plan includes a
    /// header it is written last, after every entry it points at.
    pub fn encode_into(&self, out: &mut [u8], base: u64) -> io::Result<ListHeads> {
        let total = self.total_size();
        if out.len() < total {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("image needs {} bytes, buffer has {}", total, out.len()),
            ));
        }
        let end = base.checked_add(total as u64).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "image wraps the address space")
        })?;
        if end.saturating_sub(1) > self.enc.pointer_width.max_address() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "image at {:#x}..{:#x} does not fit {}-byte pointers",
                    base,
                    end,
                    self.enc.pointer_size()
                ),
            ));
        }

        let enc = self.enc;
        let w = enc.pointer_size();
        let addr = |offset: usize| base + offset as u64;

        out[self.pool_offset..total].copy_from_slice(&self.pool);

        let tsize = type_entry_size(enc);
        for (i, entry) in self.registry.type_arena().iter().enumerate() {
            let at = self.types_offset + i * tsize;
            let next = entry
                .next()
                .map_or(0, |id| addr(self.types_offset + id.index() * tsize));
            enc.put_ptr(out, at, next)?;
            enc.put_ptr(out, at + w, self.string_address(base, entry.type_name())?)?;
            enc.put_ptr(out, at + 2 * w, self.string_address(base, entry.field_name())?)?;
            enc.put_u32(out, at + 3 * w, entry.field_offset())?;
        }

        let gsize = global_entry_size(enc);
        for (i, entry) in self.registry.global_arena().iter().enumerate() {
            let at = self.globals_offset + i * gsize;
            let next = entry
                .next()
                .map_or(0, |id| addr(self.globals_offset + id.index() * gsize));
            enc.put_ptr(out, at, next)?;
            enc.put_ptr(out, at + w, self.string_address(base, entry.name())?)?;
            enc.put_ptr(out, at + 2 * w, entry.address())?;
        }

        let heads = ListHeads {
            debug_types_list: self
                .registry
                .types_head()
                .map_or(0, |id| addr(self.types_offset + id.index() * tsize)),
            globals_list: self
                .registry
                .globals_head()
                .map_or(0, |id| addr(self.globals_offset + id.index() * gsize)),
            defines_list: 0,
        };

        if self.include_header {
            ContractHeader::new(enc)
                .with_lists(heads)
                .encode_into(&mut out[..self.types_offset])?;
        }
        Ok(heads)
    }

    fn string_address(&self, base: u64, name: &str) -> io::Result<u64> {
        self.strings
            .get(name)
            .map(|&at| base + (self.pool_offset + at) as u64)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("name '{}' missing from string pool", name),
                )
            })
    }
}
