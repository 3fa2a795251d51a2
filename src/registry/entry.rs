// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Registry entries and their identities.

use std::borrow::Cow;

/// Sentinel field name: the entry's offset is the whole type's size.
pub const SIZEOF_FIELD: &str = "SIZEOF";

/// Pseudo-type that named constants (defines) are filed under.
pub const GLOBALS_TYPE: &str = "Globals";

/// Stable identity of an entry within its list.
///
/// Ids are arena indices. They never change and are never reused, because
/// entries are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// `(type, field, offset)` fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugTypeEntry {
    pub(crate) next: Option<EntryId>,
    pub(crate) type_name: Cow<'static, str>,
    pub(crate) field_name: Cow<'static, str>,
    pub(crate) field_offset: u32,
}

impl DebugTypeEntry {
    pub fn next(&self) -> Option<EntryId> {
        self.next
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Byte offset, or the whole-type size for `SIZEOF` entries.
    pub fn field_offset(&self) -> u32 {
        self.field_offset
    }

    pub fn is_size(&self) -> bool {
        self.field_name == SIZEOF_FIELD
    }
}

/// `(name, address)` fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalValueEntry {
    pub(crate) next: Option<EntryId>,
    pub(crate) name: Cow<'static, str>,
    pub(crate) address: u64,
}

impl GlobalValueEntry {
    pub fn next(&self) -> Option<EntryId> {
        self.next
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u64 {
        self.address
    }
}
