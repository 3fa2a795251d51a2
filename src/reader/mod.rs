// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Out-of-process side: find, validate and decode a contract, then use it to
//! decode objects and walk the thread list.

mod contract;
mod memory;
mod object;
mod threads;

pub use contract::{
    ContractReader, ContractView, GlobalFact, HeaderInfo, Probe, ReaderLimits, TypeFact,
};
pub use memory::{MemoryReader, RegionMemory};
pub use object::{ObjectInfo, ObjectReader, TypeInfo};
pub use threads::{ThreadInfo, ThreadListReader, DEFAULT_MAX_THREADS};
