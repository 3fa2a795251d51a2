// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The reader protocol.
//!
//! ```text
//! probe:  read prefix ─► cookie? ──no──► NotPresent
//!                          │yes
//!                          ▼
//!                  major supported? ──no──► UnsupportedVersion (stop)
//!                          │yes
//!                          ▼
//!                  flags ─► TargetEncoding ─► read pointer slots
//! read:   walk each list from its head until next == 0
//! view:   lookups by (type, field) and by global name
//! ```
//!
//! The target is never synchronized with us. It may still be initializing
//! (null heads), it may have truncated a list, and a corrupt or hostile image
//! may loop. Null heads are an empty contract, lists are capped and checked
//! for cycles, and names are bounded.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::memory::MemoryReader;
use crate::error::ReadError;
use crate::header::{
    ContractHeader, ContractVersion, HeaderPrefix, ListHeads, Magic, HEADER_PREFIX_SIZE,
};
use crate::registry::{GLOBALS_TYPE, SIZEOF_FIELD};
use crate::wire::{global_entry_size, type_entry_size, TargetEncoding};

const NAME_CHUNK: usize = 32;

/// Bounds on what a reader will walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderLimits {
    /// Entries per list before the reader gives up.
    pub max_list_len: usize,
    /// Bytes per name, NUL excluded.
    pub max_name_len: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            max_list_len: 65_536,
            max_name_len: 512,
        }
    }
}

/// What a successful probe learned about the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub address: u64,
    pub header: ContractHeader,
}

impl HeaderInfo {
    pub fn version(&self) -> ContractVersion {
        self.header.prefix.version
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.header.encoding()
    }
}

/// Outcome of looking for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The cookie did not match. The target does not host this runtime.
    NotPresent { found: Magic },
    Present(HeaderInfo),
}

/// Decodes a contract out of target memory.
#[derive(Debug, Clone, Copy)]
pub struct ContractReader {
    expected: Magic,
    max_major: u16,
    known_minor: u16,
    limits: ReaderLimits,
}

impl Default for ContractReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractReader {
    /// A reader for the format this crate publishes.
    pub fn new() -> Self {
        Self {
            expected: Magic::LIST_HEADER,
            max_major: ContractVersion::CURRENT.major,
            known_minor: ContractVersion::CURRENT.minor,
            limits: ReaderLimits::default(),
        }
    }

    pub fn expecting(mut self, magic: Magic) -> Self {
        self.expected = magic;
        self
    }

    /// Pretend to be a reader built against `version`.
    pub fn with_supported(mut self, version: ContractVersion) -> Self {
        self.max_major = version.major;
        self.known_minor = version.minor;
        self
    }

    pub fn with_limits(mut self, limits: ReaderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> ReaderLimits {
        self.limits
    }

    /// Steps 2-4: cookie, version, flags, then the pointer slots.
    ///
    /// Reads the 16-byte prefix in one call. If the cookie or major version
    /// is rejected, nothing else is read.
    pub fn probe<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
    ) -> Result<Probe, ReadError> {
        let mut prefix_bytes = [0u8; HEADER_PREFIX_SIZE];
        read(mem, address, &mut prefix_bytes)?;
        let prefix = HeaderPrefix::decode(&prefix_bytes)
            .map_err(|source| ReadError::Decode { address, source })?;

        if prefix.magic != self.expected {
            info!(
                "no contract at {:#x}: found cookie {} ({}), expected {}",
                address,
                prefix.magic,
                prefix.magic.generation().unwrap_or("unknown"),
                self.expected
            );
            return Ok(Probe::NotPresent {
                found: prefix.magic,
            });
        }

        if !prefix.version.is_supported_by(self.max_major) {
            return Err(ReadError::UnsupportedVersion {
                found: prefix.version,
                supported: self.max_major,
            });
        }

        // A newer minor may have given reserved bits a meaning; ignore them.
        if prefix.version <= ContractVersion::new(self.max_major, self.known_minor) {
            prefix.flags.validate()?;
        } else if prefix.flags.reserved_bits() != 0 {
            debug!(
                "ignoring flag bits {:#x} from newer contract {}",
                prefix.flags.reserved_bits(),
                prefix.version
            );
        }

        let width = prefix.flags.pointer_width();
        let mut bytes = vec![0u8; ContractHeader::size(width)];
        bytes[..HEADER_PREFIX_SIZE].copy_from_slice(&prefix_bytes);
        read(
            mem,
            address + HEADER_PREFIX_SIZE as u64,
            &mut bytes[HEADER_PREFIX_SIZE..],
        )?;
        let header = ContractHeader::decode_lists(prefix, &bytes)
            .map_err(|source| ReadError::Decode { address, source })?;

        Ok(Probe::Present(HeaderInfo { address, header }))
    }

    /// Probe, then walk both lists. `None` when no contract is present.
    pub fn read<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        address: u64,
    ) -> Result<Option<ContractView>, ReadError> {
        match self.probe(mem, address)? {
            Probe::NotPresent { .. } => Ok(None),
            Probe::Present(info) => self.read_lists(mem, info).map(Some),
        }
    }

    /// Step 5: walk the lists a probe found.
    pub fn read_lists<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        info: HeaderInfo,
    ) -> Result<ContractView, ReadError> {
        let enc = info.encoding();
        let lists = info.header.lists;
        if lists.is_null() {
            debug!("contract at {:#x} has null list heads", info.address);
        }
        if lists.defines_list != 0 {
            debug!(
                "ignoring defines list at {:#x}; defines are read from the type list",
                lists.defines_list
            );
        }

        let mut names = NameCache::new(self.limits.max_name_len);
        let types = self.walk_types(mem, enc, lists.debug_types_list, &mut names)?;
        let globals = self.walk_globals(mem, enc, lists.globals_list, &mut names)?;
        debug!(
            "read {} type entries and {} globals from contract {}",
            types.len(),
            globals.len(),
            info.version()
        );

        Ok(ContractView::new(info, types, globals))
    }

    fn walk_types<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        enc: TargetEncoding,
        head: u64,
        names: &mut NameCache,
    ) -> Result<Vec<TypeFact>, ReadError> {
        let w = enc.pointer_size();
        let mut entry = vec![0u8; type_entry_size(enc)];
        let mut facts = Vec::new();
        let mut walk = ListWalk::new("type", head, self.limits.max_list_len);

        while let Some(address) = walk.step()? {
            read(mem, address, &mut entry)?;
            let decode = |source| ReadError::Decode { address, source };
            let next = enc.get_ptr(&entry, 0).map_err(decode)?;
            let type_name = enc.get_ptr(&entry, w).map_err(decode)?;
            let field_name = enc.get_ptr(&entry, 2 * w).map_err(decode)?;
            let field_offset = enc.get_u32(&entry, 3 * w).map_err(decode)?;
            facts.push(TypeFact {
                type_name: names.read(mem, type_name)?,
                field_name: names.read(mem, field_name)?,
                field_offset,
                entry_address: address,
            });
            walk.advance(next);
        }
        Ok(facts)
    }

    fn walk_globals<M: MemoryReader + ?Sized>(
        &self,
        mem: &M,
        enc: TargetEncoding,
        head: u64,
        names: &mut NameCache,
    ) -> Result<Vec<GlobalFact>, ReadError> {
        let w = enc.pointer_size();
        let mut entry = vec![0u8; global_entry_size(enc)];
        let mut facts = Vec::new();
        let mut walk = ListWalk::new("globals", head, self.limits.max_list_len);

        while let Some(address) = walk.step()? {
            read(mem, address, &mut entry)?;
            let decode = |source| ReadError::Decode { address, source };
            let next = enc.get_ptr(&entry, 0).map_err(decode)?;
            let name = enc.get_ptr(&entry, w).map_err(decode)?;
            let value = enc.get_ptr(&entry, 2 * w).map_err(decode)?;
            facts.push(GlobalFact {
                name: names.read(mem, name)?,
                address: value,
                entry_address: address,
            });
            walk.advance(next);
        }
        Ok(facts)
    }
}

/// Cursor over one linked list, with the cycle and length defences.
pub(super) struct ListWalk {
    list: &'static str,
    cursor: u64,
    limit: usize,
    visited: HashSet<u64>,
}

impl ListWalk {
    pub(super) fn new(list: &'static str, head: u64, limit: usize) -> Self {
        Self {
            list,
            cursor: head,
            limit,
            visited: HashSet::new(),
        }
    }

    pub(super) fn step(&mut self) -> Result<Option<u64>, ReadError> {
        if self.cursor == 0 {
            return Ok(None);
        }
        if self.visited.len() >= self.limit {
            return Err(ReadError::ListTooLong {
                list: self.list,
                limit: self.limit,
            });
        }
        if !self.visited.insert(self.cursor) {
            return Err(ReadError::ListCycle {
                list: self.list,
                address: self.cursor,
            });
        }
        Ok(Some(self.cursor))
    }

    pub(super) fn advance(&mut self, next: u64) {
        self.cursor = next;
    }
}

/// Names are shared between entries, so each address is read once.
struct NameCache {
    max_len: usize,
    seen: HashMap<u64, String>,
}

impl NameCache {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            seen: HashMap::new(),
        }
    }

    fn read<M: MemoryReader + ?Sized>(&mut self, mem: &M, address: u64) -> Result<String, ReadError> {
        if let Some(name) = self.seen.get(&address) {
            return Ok(name.clone());
        }
        let name = read_c_string(mem, address, self.max_len)?;
        self.seen.insert(address, name.clone());
        Ok(name)
    }
}

/// Read a NUL-terminated name of at most `max_len` bytes.
///
/// Reads in chunks. A chunk may run off the end of mapped memory even when
/// the name itself does not, so a failed chunk falls back to single bytes.
fn read_c_string<M: MemoryReader + ?Sized>(
    mem: &M,
    address: u64,
    max_len: usize,
) -> Result<String, ReadError> {
    if address == 0 {
        return Err(ReadError::InvalidName { address });
    }
    let mut bytes = Vec::new();
    let mut chunk = [0u8; NAME_CHUNK];

    while bytes.len() <= max_len {
        let at = address + bytes.len() as u64;
        let want = NAME_CHUNK.min(max_len + 1 - bytes.len());
        let got = match mem.read_at(at, &mut chunk[..want]) {
            Ok(()) => &chunk[..want],
            Err(_) => {
                let mut byte = [0u8; 1];
                read(mem, at, &mut byte)?;
                chunk[0] = byte[0];
                &chunk[..1]
            }
        };
        if let Some(nul) = got.iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&got[..nul]);
            return String::from_utf8(bytes).map_err(|_| ReadError::InvalidName { address });
        }
        bytes.extend_from_slice(got);
    }
    Err(ReadError::NameTooLong {
        address,
        limit: max_len,
    })
}

fn read<M: MemoryReader + ?Sized>(mem: &M, address: u64, buf: &mut [u8]) -> Result<(), ReadError> {
    mem.read_at(address, buf).map_err(|source| ReadError::Memory {
        address,
        len: buf.len(),
        source,
    })
}

// ============================================================================
// VIEW
// ============================================================================

/// A `(type, field, offset)` fact as read from a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFact {
    pub type_name: String,
    pub field_name: String,
    pub field_offset: u32,
    /// Where the entry itself lives in the target.
    pub entry_address: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFact {
    pub name: String,
    pub address: u64,
    pub entry_address: u64,
}

/// A decoded contract, with keyed lookup (step 6).
///
/// Facts keep list order (newest first). A key registered twice resolves to
/// the first one met, i.e. the newest.
#[derive(Debug, Clone, Serialize)]
pub struct ContractView {
    pub header_address: u64,
    pub magic: Magic,
    pub version: ContractVersion,
    pub encoding: TargetEncoding,
    pub lists: ListHeads,
    pub types: Vec<TypeFact>,
    pub globals: Vec<GlobalFact>,
    #[serde(skip)]
    type_index: HashMap<(String, String), usize>,
    #[serde(skip)]
    global_index: HashMap<String, usize>,
}

impl ContractView {
    fn new(info: HeaderInfo, types: Vec<TypeFact>, globals: Vec<GlobalFact>) -> Self {
        let mut type_index = HashMap::new();
        for (i, fact) in types.iter().enumerate() {
            type_index
                .entry((fact.type_name.clone(), fact.field_name.clone()))
                .or_insert(i);
        }
        let mut global_index = HashMap::new();
        for (i, fact) in globals.iter().enumerate() {
            global_index.entry(fact.name.clone()).or_insert(i);
        }
        Self {
            header_address: info.address,
            magic: info.header.prefix.magic,
            version: info.version(),
            encoding: info.encoding(),
            lists: info.header.lists,
            types,
            globals,
            type_index,
            global_index,
        }
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<u32> {
        self.type_index
            .get(&(type_name.to_string(), field_name.to_string()))
            .map(|&i| self.types[i].field_offset)
    }

    pub fn size_of(&self, type_name: &str) -> Option<u32> {
        self.field(type_name, SIZEOF_FIELD)
    }

    pub fn define(&self, name: &str) -> Option<u32> {
        self.field(GLOBALS_TYPE, name)
    }

    pub fn global(&self, name: &str) -> Option<u64> {
        self.global_index.get(name).map(|&i| self.globals[i].address)
    }

    /// Like `field`, but absence is an error for callers that cannot proceed.
    pub fn require(&self, type_name: &str, field_name: &str) -> Result<u32, ReadError> {
        self.field(type_name, field_name)
            .ok_or_else(|| ReadError::MissingEntry {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
            })
    }

    /// Distinct type names, in first-seen order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.types
            .iter()
            .map(|f| f.type_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Every fact for one type, in list order.
    pub fn fields_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a TypeFact> + 'a {
        self.types.iter().filter(move |f| f.type_name == type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.globals.is_empty()
    }
}
