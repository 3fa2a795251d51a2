//! Test utilities shared across unit and integration tests.
//!
//! This module is always compiled but hidden from documentation.
//! It provides canonical implementations of test helpers to avoid duplication.

#![doc(hidden)]

use std::cell::Cell;
use std::io;

use crate::header::{ContractHeader, ContractVersion, HeaderFlags, HeaderPrefix, HEADER_PREFIX_SIZE};
use crate::layout::ObjectShape;
use crate::reader::MemoryReader;
use crate::registry::{populate, Registry, RuntimeGlobals};
use crate::wire::{ImagePlan, MemoryImage, TargetEncoding};

/// Base address used by fixtures unless a test needs another.
pub const FIXTURE_BASE: u64 = 0x10_0000;

/// Counts `read_at` calls against an inner reader.
pub struct CountingMemory<M> {
    inner: M,
    reads: Cell<usize>,
}

impl<M: MemoryReader> CountingMemory<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl<M: MemoryReader> MemoryReader for CountingMemory<M> {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_at(address, buf)
    }
}

/// A registry holding the fixed table and `globals`.
pub fn table_registry(enc: TargetEncoding, globals: &RuntimeGlobals) -> Registry {
    let shape = ObjectShape::new(enc.pointer_width);
    let mut registry = Registry::new();
    populate(&mut registry, &shape, globals, &[]);
    registry
}

/// A registry with `n` synthetic `(Type{i}, field{i})` pairs.
pub fn pairs_registry(n: usize) -> Registry {
    let mut registry = Registry::new();
    for i in 0..n {
        registry.register_field(format!("Type{}", i), format!("field{}", i), i as u32);
    }
    registry
}

/// Encode `registry` with a header at `FIXTURE_BASE`.
pub fn encode_with_header(registry: &Registry, enc: TargetEncoding) -> MemoryImage {
    ImagePlan::new(registry, enc, true)
        .encode(FIXTURE_BASE)
        .expect("fixture encodes")
        .0
}

/// A lone header (null lists) claiming `version` and raw `flags`.
pub fn header_only(enc: TargetEncoding, version: ContractVersion, flags: u32) -> MemoryImage {
    let mut header = ContractHeader::new(enc);
    header.prefix = HeaderPrefix {
        version,
        flags: HeaderFlags(flags),
        ..header.prefix
    };
    let mut bytes = vec![0u8; ContractHeader::size(enc.pointer_width)];
    bytes[..HEADER_PREFIX_SIZE].copy_from_slice(&header.prefix.encode());
    MemoryImage::new(FIXTURE_BASE, bytes)
}
