// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The contract registry: every `(type, field, offset)` and `(name, address)`
//! fact a diagnostic tool needs, collected in one pass at startup.
//!
//! Entries live in an arena (`Vec`) and link to their predecessor, which gives
//! the wire form its head-insertion order: the newest entry is the list head
//! and `next` walks back towards the first one. Nothing is ever removed or
//! changed after it is appended, which is what lets an out-of-process reader
//! walk the lists without coordinating with the target's threads.
//!
//! Registration never fails. If an entry cannot be allocated it is dropped,
//! the registry is marked truncated, and startup continues. Readers treat a
//! missing entry as "unknown", so a short list is degraded, not broken.
//!
//! Names are written as NUL-terminated strings, so a name holding a NUL is
//! refused outright and kept as a `RegistryError`. Publishing a registry with
//! refused names fails; that is a caller bug, not a resource limit.
//!
//! Lookups are by key, never by position. When a key is registered twice the
//! newer entry wins, matching what a reader walking from the head sees first.

mod entry;
mod table;

use std::borrow::Cow;
use std::collections::HashMap;

use log::{error, warn};

use crate::error::RegistryError;

pub use entry::{DebugTypeEntry, EntryId, GlobalValueEntry, GLOBALS_TYPE, SIZEOF_FIELD};
pub use table::{
    populate, ContractSource, DefineFact, FieldFact, FieldKind, RuntimeGlobals, CONTRACT_DEFINES,
    CONTRACT_FIELDS, CONTRACT_GLOBALS,
};

/// Append-only store of contract facts.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    types: Vec<DebugTypeEntry>,
    globals: Vec<GlobalValueEntry>,
    type_index: HashMap<Cow<'static, str>, HashMap<Cow<'static, str>, EntryId>>,
    global_index: HashMap<Cow<'static, str>, EntryId>,
    /// Total entries (both lists) this registry may hold. `None` = unbounded.
    budget: Option<usize>,
    dropped: usize,
    rejected: Vec<RegistryError>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that stops accepting entries after `max_entries`.
    ///
    /// Used to model allocation failure deterministically.
    pub fn with_budget(max_entries: usize) -> Self {
        Self {
            budget: Some(max_entries),
            ..Self::default()
        }
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Record the byte offset of `field_name` within `type_name`.
    pub fn register_field(
        &mut self,
        type_name: impl Into<Cow<'static, str>>,
        field_name: impl Into<Cow<'static, str>>,
        field_offset: u32,
    ) -> Option<EntryId> {
        let type_name = type_name.into();
        let field_name = field_name.into();
        if !self.accepts(&type_name) || !self.accepts(&field_name) {
            return None;
        }
        if !self.reserve_type_slot() {
            self.note_dropped(&type_name, &field_name);
            return None;
        }

        let id = EntryId(self.types.len() as u32);
        let next = self.types.len().checked_sub(1).map(|i| EntryId(i as u32));
        self.type_index
            .entry(type_name.clone())
            .or_default()
            .insert(field_name.clone(), id);
        self.types.push(DebugTypeEntry {
            next,
            type_name,
            field_name,
            field_offset,
        });
        Some(id)
    }

    /// Record the whole size of `type_name` under the `SIZEOF` sentinel.
    pub fn register_size(
        &mut self,
        type_name: impl Into<Cow<'static, str>>,
        size: u32,
    ) -> Option<EntryId> {
        self.register_field(type_name, SIZEOF_FIELD, size)
    }

    /// Record a named constant. Filed as a type entry under `Globals`.
    pub fn register_define(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: u32,
    ) -> Option<EntryId> {
        self.register_field(GLOBALS_TYPE, name, value)
    }

    /// Record the address of a process-wide variable.
    pub fn register_global(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        address: u64,
    ) -> Option<EntryId> {
        let name = name.into();
        if !self.accepts(&name) {
            return None;
        }
        if !self.reserve_global_slot() {
            self.note_dropped(&name, "");
            return None;
        }

        let id = EntryId(self.globals.len() as u32);
        let next = self.globals.len().checked_sub(1).map(|i| EntryId(i as u32));
        self.global_index.insert(name.clone(), id);
        self.globals.push(GlobalValueEntry { next, name, address });
        Some(id)
    }

    /// Names must survive being written as C strings.
    pub fn check_name(name: &str) -> Result<(), RegistryError> {
        if name.contains('\0') {
            return Err(RegistryError::InteriorNul {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn accepts(&mut self, name: &str) -> bool {
        match Self::check_name(name) {
            Ok(()) => true,
            Err(err) => {
                error!("contract registry refused an entry: {}", err);
                self.rejected.push(err);
                false
            }
        }
    }

    fn within_budget(&self) -> bool {
        match self.budget {
            Some(max) => self.types.len() + self.globals.len() < max,
            None => true,
        }
    }

    fn reserve_type_slot(&mut self) -> bool {
        self.within_budget() && self.types.try_reserve(1).is_ok()
    }

    fn reserve_global_slot(&mut self) -> bool {
        self.within_budget() && self.globals.try_reserve(1).is_ok()
    }

    fn note_dropped(&mut self, name: &str, field: &str) {
        self.dropped += 1;
        if self.dropped == 1 {
            warn!(
                "contract registry allocation failed at '{}{}{}'; continuing with a truncated list",
                name,
                if field.is_empty() { "" } else { "." },
                field
            );
        }
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Offset of `type_name.field_name`, if registered.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<u32> {
        let id = self.type_index.get(type_name)?.get(field_name)?;
        Some(self.types[id.index()].field_offset)
    }

    pub fn size_of(&self, type_name: &str) -> Option<u32> {
        self.field(type_name, SIZEOF_FIELD)
    }

    pub fn define(&self, name: &str) -> Option<u32> {
        self.field(GLOBALS_TYPE, name)
    }

    pub fn global(&self, name: &str) -> Option<u64> {
        let id = self.global_index.get(name)?;
        Some(self.globals[id.index()].address)
    }

    pub fn type_entry(&self, id: EntryId) -> Option<&DebugTypeEntry> {
        self.types.get(id.index())
    }

    pub fn global_entry(&self, id: EntryId) -> Option<&GlobalValueEntry> {
        self.globals.get(id.index())
    }

    // ========================================================================
    // TRAVERSAL
    // ========================================================================

    /// Head of the type list (the newest entry).
    pub fn types_head(&self) -> Option<EntryId> {
        self.types.len().checked_sub(1).map(|i| EntryId(i as u32))
    }

    pub fn globals_head(&self) -> Option<EntryId> {
        self.globals.len().checked_sub(1).map(|i| EntryId(i as u32))
    }

    /// Walk the type list from the head, following `next`.
    pub fn types(&self) -> impl Iterator<Item = (EntryId, &DebugTypeEntry)> + '_ {
        let mut cursor = self.types_head();
        std::iter::from_fn(move || {
            let id = cursor?;
            let entry = &self.types[id.index()];
            cursor = entry.next;
            Some((id, entry))
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = (EntryId, &GlobalValueEntry)> + '_ {
        let mut cursor = self.globals_head();
        std::iter::from_fn(move || {
            let id = cursor?;
            let entry = &self.globals[id.index()];
            cursor = entry.next;
            Some((id, entry))
        })
    }

    /// Entries in arena (registration) order. The wire encoder lays them out
    /// this way; everything else should use `types()`.
    pub fn type_arena(&self) -> &[DebugTypeEntry] {
        &self.types
    }

    pub fn global_arena(&self) -> &[GlobalValueEntry] {
        &self.globals
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.globals.is_empty()
    }

    /// Did any registration get dropped?
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Registrations refused for an unrepresentable name.
    pub fn rejected(&self) -> &[RegistryError] {
        &self.rejected
    }
}
