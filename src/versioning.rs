// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Versioning policy: which layout changes need which version bump.
//!
//! | Change                                                   | Bump  |
//! |----------------------------------------------------------|-------|
//! | Remove or reorder an exposed field, define or global     | major |
//! | Change a field's data type                               | major |
//! | Change a field's or constant's meaning (value, offset)   | major |
//! | Remove or reorder a header pointer slot                  | major |
//! | Add a field at the end of a type, existing offsets kept  | minor |
//! | Add new types, fields, defines or globals                | minor |
//! | Give a reserved flag bit a documented meaning            | minor |
//! | Append a header pointer slot                             | minor |
//!
//! The table is enforced by comparing `LayoutManifest`s: one is checked into
//! the tree for the last release, one is generated from the current build,
//! and `check_version_bump` fails if the declared version bump is smaller
//! than what the diff requires.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::header::{ContractVersion, HeaderFlags};
use crate::layout::ObjectShape;
use crate::reader::ContractView;
use crate::registry::{FieldKind, CONTRACT_DEFINES, CONTRACT_FIELDS, CONTRACT_GLOBALS, SIZEOF_FIELD};
use crate::wire::TargetEncoding;

/// Header pointer slots of the current generation, in order.
pub const HEADER_SLOTS: [&str; 3] = ["debug_types_list", "globals_list", "defines_list"];

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Size of a version increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    None,
    Minor,
    Major,
}

impl fmt::Display for Bump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bump::None => "none",
            Bump::Minor => "minor",
            Bump::Major => "major",
        })
    }
}

/// One difference between two layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    TargetChanged { old: TargetEncoding, new: TargetEncoding },
    FieldRemoved { type_name: String, field_name: String },
    FieldMoved { type_name: String, field_name: String, old: u32, new: u32 },
    FieldKindChanged { type_name: String, field_name: String, old: FieldKind, new: FieldKind },
    TypeShrunk { type_name: String, old: u32, new: u32 },
    DefineRemoved { name: String },
    DefineChanged { name: String, old: u32, new: u32 },
    GlobalRemoved { name: String },
    HeaderSlotRemoved { slot: String },
    HeaderSlotMoved { slot: String, old: usize, new: usize },
    FlagBitRemoved { bit: u32 },
    TypeAdded { type_name: String },
    FieldAdded { type_name: String, field_name: String },
    TypeGrown { type_name: String, old: u32, new: u32 },
    DefineAdded { name: String },
    GlobalAdded { name: String },
    HeaderSlotAdded { slot: String },
    FlagBitDefined { bit: u32 },
}

impl Change {
    pub fn bump(&self) -> Bump {
        match self {
            Change::TargetChanged { .. }
            | Change::FieldRemoved { .. }
            | Change::FieldMoved { .. }
            | Change::FieldKindChanged { .. }
            | Change::TypeShrunk { .. }
            | Change::DefineRemoved { .. }
            | Change::DefineChanged { .. }
            | Change::GlobalRemoved { .. }
            | Change::HeaderSlotRemoved { .. }
            | Change::HeaderSlotMoved { .. }
            | Change::FlagBitRemoved { .. } => Bump::Major,
            Change::TypeAdded { .. }
            | Change::FieldAdded { .. }
            | Change::TypeGrown { .. }
            | Change::DefineAdded { .. }
            | Change::GlobalAdded { .. }
            | Change::HeaderSlotAdded { .. }
            | Change::FlagBitDefined { .. } => Bump::Minor,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::TargetChanged { old, new } => write!(f, "target changed from {} to {}", old, new),
            Change::FieldRemoved { type_name, field_name } => {
                write!(f, "{}.{} removed", type_name, field_name)
            }
            Change::FieldMoved { type_name, field_name, old, new } => {
                write!(f, "{}.{} moved from {} to {}", type_name, field_name, old, new)
            }
            Change::FieldKindChanged { type_name, field_name, old, new } => write!(
                f,
                "{}.{} changed type from {:?} to {:?}",
                type_name, field_name, old, new
            ),
            Change::TypeShrunk { type_name, old, new } => {
                write!(f, "{} shrank from {} to {} bytes", type_name, old, new)
            }
            Change::DefineRemoved { name } => write!(f, "define {} removed", name),
            Change::DefineChanged { name, old, new } => {
                write!(f, "define {} changed from {} to {}", name, old, new)
            }
            Change::GlobalRemoved { name } => write!(f, "global {} removed", name),
            Change::HeaderSlotRemoved { slot } => write!(f, "header slot {} removed", slot),
            Change::HeaderSlotMoved { slot, old, new } => {
                write!(f, "header slot {} moved from {} to {}", slot, old, new)
            }
            Change::FlagBitRemoved { bit } => write!(f, "flag bit {:#x} no longer defined", bit),
            Change::TypeAdded { type_name } => write!(f, "type {} added", type_name),
            Change::FieldAdded { type_name, field_name } => {
                write!(f, "{}.{} added", type_name, field_name)
            }
            Change::TypeGrown { type_name, old, new } => {
                write!(f, "{} grew from {} to {} bytes", type_name, old, new)
            }
            Change::DefineAdded { name } => write!(f, "define {} added", name),
            Change::GlobalAdded { name } => write!(f, "global {} added", name),
            Change::HeaderSlotAdded { slot } => write!(f, "header slot {} added", slot),
            Change::FlagBitDefined { bit } => write!(f, "flag bit {:#x} now defined", bit),
        }
    }
}

// ============================================================================
// MANIFEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestField {
    pub type_name: String,
    pub field_name: String,
    pub offset: u32,
    /// Unknown for manifests recovered from a target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
}

/// Everything a layout promises, in a diffable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutManifest {
    pub version: ContractVersion,
    pub target: TargetEncoding,
    pub header_slots: Vec<String>,
    pub defined_flags: u32,
    pub fields: Vec<ManifestField>,
    pub defines: BTreeMap<String, u32>,
    pub globals: BTreeSet<String>,
}

impl LayoutManifest {
    /// The layout this build publishes for `target`.
    pub fn for_target(target: TargetEncoding) -> Self {
        let shape = ObjectShape::new(target.pointer_width);
        Self {
            version: ContractVersion::CURRENT,
            target,
            header_slots: HEADER_SLOTS.iter().map(|s| s.to_string()).collect(),
            defined_flags: HeaderFlags::DEFINED,
            fields: CONTRACT_FIELDS
                .iter()
                .map(|fact| ManifestField {
                    type_name: fact.type_name.to_string(),
                    field_name: fact.field_name.to_string(),
                    offset: fact.offset_for(&shape),
                    kind: Some(fact.kind),
                })
                .collect(),
            defines: CONTRACT_DEFINES
                .iter()
                .map(|d| (d.name.to_string(), d.value_for(&shape)))
                .collect(),
            globals: CONTRACT_GLOBALS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The layout a target actually published.
    ///
    /// Field kinds are not on the wire; table fields get their table kind,
    /// `SIZEOF` entries are sizes, anything else stays unknown.
    pub fn from_view(view: &ContractView) -> Self {
        let mut fields: Vec<ManifestField> = Vec::new();
        let mut defines = BTreeMap::new();
        let mut seen = BTreeSet::new();
        // Oldest first, so the manifest reads in registration order
        for fact in view.types.iter().rev() {
            if fact.type_name == crate::registry::GLOBALS_TYPE {
                defines.insert(fact.field_name.clone(), fact.field_offset);
                continue;
            }
            let key = (fact.type_name.clone(), fact.field_name.clone());
            let offset = view.field(&key.0, &key.1).unwrap_or(fact.field_offset);
            if !seen.insert(key) {
                continue;
            }
            let kind = if fact.field_name == SIZEOF_FIELD {
                Some(FieldKind::Size)
            } else {
                CONTRACT_FIELDS
                    .iter()
                    .find(|f| f.type_name == fact.type_name && f.field_name == fact.field_name)
                    .map(|f| f.kind)
            };
            fields.push(ManifestField {
                type_name: fact.type_name.clone(),
                field_name: fact.field_name.clone(),
                offset,
                kind,
            });
        }
        for name in defines.keys().cloned().collect::<Vec<_>>() {
            if let Some(value) = view.define(&name) {
                defines.insert(name, value);
            }
        }

        Self {
            version: view.version,
            target: view.encoding,
            header_slots: HEADER_SLOTS.iter().map(|s| s.to_string()).collect(),
            defined_flags: HeaderFlags::DEFINED,
            fields,
            defines,
            globals: view.globals.iter().map(|g| g.name.clone()).collect(),
        }
    }

    fn field(&self, type_name: &str, field_name: &str) -> Option<&ManifestField> {
        self.fields
            .iter()
            .find(|f| f.type_name == type_name && f.field_name == field_name)
    }

    fn has_type(&self, type_name: &str) -> bool {
        self.fields.iter().any(|f| f.type_name == type_name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

// ============================================================================
// DIFF
// ============================================================================

/// Every change from `old` to `new`, breaking ones first.
pub fn diff_manifests(old: &LayoutManifest, new: &LayoutManifest) -> Vec<Change> {
    let mut changes = Vec::new();

    if old.target != new.target {
        changes.push(Change::TargetChanged {
            old: old.target,
            new: new.target,
        });
    }

    for (i, slot) in old.header_slots.iter().enumerate() {
        match new.header_slots.iter().position(|s| s == slot) {
            None => changes.push(Change::HeaderSlotRemoved { slot: slot.clone() }),
            Some(j) if j != i => changes.push(Change::HeaderSlotMoved {
                slot: slot.clone(),
                old: i,
                new: j,
            }),
            Some(_) => {}
        }
    }
    for slot in &new.header_slots {
        if !old.header_slots.contains(slot) {
            changes.push(Change::HeaderSlotAdded { slot: slot.clone() });
        }
    }

    for bit in (0..32).map(|b| 1u32 << b) {
        match (old.defined_flags & bit != 0, new.defined_flags & bit != 0) {
            (true, false) => changes.push(Change::FlagBitRemoved { bit }),
            (false, true) => changes.push(Change::FlagBitDefined { bit }),
            _ => {}
        }
    }

    for field in &old.fields {
        let (ty, name) = (&field.type_name, &field.field_name);
        match new.field(ty, name) {
            None => changes.push(Change::FieldRemoved {
                type_name: ty.clone(),
                field_name: name.clone(),
            }),
            Some(current) if name == SIZEOF_FIELD => {
                if current.offset < field.offset {
                    changes.push(Change::TypeShrunk {
                        type_name: ty.clone(),
                        old: field.offset,
                        new: current.offset,
                    });
                } else if current.offset > field.offset {
                    changes.push(Change::TypeGrown {
                        type_name: ty.clone(),
                        old: field.offset,
                        new: current.offset,
                    });
                }
            }
            Some(current) => {
                if current.offset != field.offset {
                    changes.push(Change::FieldMoved {
                        type_name: ty.clone(),
                        field_name: name.clone(),
                        old: field.offset,
                        new: current.offset,
                    });
                }
                if let (Some(old_kind), Some(new_kind)) = (field.kind, current.kind) {
                    if old_kind != new_kind {
                        changes.push(Change::FieldKindChanged {
                            type_name: ty.clone(),
                            field_name: name.clone(),
                            old: old_kind,
                            new: new_kind,
                        });
                    }
                }
            }
        }
    }
    let mut added_types = BTreeSet::new();
    for field in &new.fields {
        if old.field(&field.type_name, &field.field_name).is_some() {
            continue;
        }
        if !old.has_type(&field.type_name) {
            if added_types.insert(field.type_name.clone()) {
                changes.push(Change::TypeAdded {
                    type_name: field.type_name.clone(),
                });
            }
        } else {
            changes.push(Change::FieldAdded {
                type_name: field.type_name.clone(),
                field_name: field.field_name.clone(),
            });
        }
    }

    for (name, &value) in &old.defines {
        match new.defines.get(name) {
            None => changes.push(Change::DefineRemoved { name: name.clone() }),
            Some(&current) if current != value => changes.push(Change::DefineChanged {
                name: name.clone(),
                old: value,
                new: current,
            }),
            Some(_) => {}
        }
    }
    for name in new.defines.keys() {
        if !old.defines.contains_key(name) {
            changes.push(Change::DefineAdded { name: name.clone() });
        }
    }

    for name in old.globals.difference(&new.globals) {
        changes.push(Change::GlobalRemoved { name: name.clone() });
    }
    for name in new.globals.difference(&old.globals) {
        changes.push(Change::GlobalAdded { name: name.clone() });
    }

    changes.sort_by_key(|c| std::cmp::Reverse(c.bump()));
    changes
}

/// The largest bump any change needs.
pub fn required_bump(changes: &[Change]) -> Bump {
    changes.iter().map(Change::bump).max().unwrap_or(Bump::None)
}

/// What moving from `old` to `new` amounts to.
pub fn declared_bump(old: ContractVersion, new: ContractVersion) -> Option<Bump> {
    use std::cmp::Ordering::*;
    match (new.major.cmp(&old.major), new.minor.cmp(&old.minor)) {
        (Greater, _) => Some(Bump::Major),
        (Equal, Greater) => Some(Bump::Minor),
        (Equal, Equal) => Some(Bump::None),
        _ => None,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("version went backwards from {old} to {new}")]
    VersionWentBackwards {
        old: ContractVersion,
        new: ContractVersion,
    },

    #[error("{old} -> {new} is a {declared} bump, but the layout changes need a {required} bump (first: {reason})")]
    InsufficientBump {
        old: ContractVersion,
        new: ContractVersion,
        declared: Bump,
        required: Bump,
        reason: String,
    },
}

/// Check that `old → new` is at least as big a bump as `changes` need.
/// Returns the required bump on success.
pub fn check_version_bump(
    old: ContractVersion,
    new: ContractVersion,
    changes: &[Change],
) -> Result<Bump, PolicyViolation> {
    let declared =
        declared_bump(old, new).ok_or(PolicyViolation::VersionWentBackwards { old, new })?;
    let required = required_bump(changes);
    if declared < required {
        let reason = changes
            .iter()
            .find(|c| c.bump() == required)
            .map(|c| c.to_string())
            .unwrap_or_default();
        return Err(PolicyViolation::InsufficientBump {
            old,
            new,
            declared,
            required,
            reason,
        });
    }
    Ok(required)
}
