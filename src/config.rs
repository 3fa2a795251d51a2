// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Tool configuration, read from a JSON file. Every field has a default.
//!
//! ```json
//! {
//!   "target": { "pointer_width": 4, "endianness": "big" },
//!   "base_address": 1048576,
//!   "max_registry_entries": 256,
//!   "reader": { "max_list_len": 1024 }
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::reader::ReaderLimits;
use crate::wire::TargetEncoding;

/// Default base address for detached images.
pub const DEFAULT_BASE_ADDRESS: u64 = 0x1000_0000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub target: TargetEncoding,
    pub base_address: u64,
    /// Cap on registry entries; `None` means unbounded.
    pub max_registry_entries: Option<usize>,
    pub reader: ReaderLimits,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            target: TargetEncoding::host(),
            base_address: DEFAULT_BASE_ADDRESS,
            max_registry_entries: None,
            reader: ReaderLimits::default(),
        }
    }
}

impl ContractConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {}", path.display(), e),
            )
        })
    }
}
