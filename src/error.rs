// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Error types.
//!
//! Note what is *not* here: a bad cookie. A mismatched magic means "this
//! process does not host the runtime", which the reader reports as
//! `Probe::NotPresent`, never as an error.

use std::io;

use thiserror::Error;

use crate::header::ContractVersion;

/// Object model contract breaches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("type pointer of object at {address:#x} is already set")]
    TypeAlreadySet { address: u64 },

    #[error("object at {address:#x} has no type pointer yet")]
    TypeNotSet { address: u64 },

    #[error("component size {component_size} is only valid for array types")]
    ComponentSizeOutOfRange { component_size: u16 },

    #[error("elements of object at {address:#x} with base size {base_size} fall outside the address space")]
    AddressOverflow { address: u64, base_size: u32 },
}

/// Reader-side failures while decoding a target's contract.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {len} bytes at {address:#x}: {source}")]
    Memory {
        address: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("unsupported contract version {found} (this reader understands major version {supported} and below)")]
    UnsupportedVersion {
        found: ContractVersion,
        supported: u16,
    },

    #[error("reserved header flag bits are set: {bits:#010x}")]
    ReservedFlags { bits: u32 },

    #[error("{list} list exceeds {limit} entries")]
    ListTooLong { list: &'static str, limit: usize },

    #[error("{list} list revisits entry at {address:#x}")]
    ListCycle { list: &'static str, address: u64 },

    #[error("name at {address:#x} is not NUL-terminated within {limit} bytes")]
    NameTooLong { address: u64, limit: usize },

    #[error("name at {address:#x} is not valid UTF-8")]
    InvalidName { address: u64 },

    #[error("contract has no entry for {type_name}.{field_name}")]
    MissingEntry {
        type_name: String,
        field_name: String,
    },

    #[error("field at {base:#x} + {offset} wraps the address space")]
    AddressOverflow { base: u64, offset: u32 },

    #[error("object at {address:#x} has a null type pointer")]
    UntypedObject { address: u64 },

    #[error("malformed entry at {address:#x}: {source}")]
    Decode {
        address: u64,
        #[source]
        source: io::Error,
    },
}

/// Registrations the wire format cannot carry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("name {name:?} contains a NUL byte and would be cut short on the wire")]
    InteriorNul { name: String },
}

/// Failures publishing the process contract.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("contract is already published")]
    AlreadyPublished,

    #[error("contract is being published by another caller")]
    InProgress,

    #[error("refused registration: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to encode contract image: {0}")]
    Encode(#[from] io::Error),
}
