// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Publishing a contract: `Uninitialized → Publishing → Published`.
//!
//! All mutation happens while `Publishing`, on the one thread that won the
//! transition. Once `Published`, the registry and image are frozen: the
//! context hands out shared references only, and nothing can move it back.
//!
//! The lock guards the state word, not the work. It is released while the
//! registry is populated and encoded, so a concurrent (or re-entrant) caller
//! sees `Publishing` and gets `PublishError::InProgress` instead of blocking.

use std::io;
use std::sync::OnceLock;

use log::{info, warn};
use parking_lot::{const_mutex, Mutex};

use crate::contracts::{check_list_links, check_offset_in_type};
use crate::error::PublishError;
use crate::header::{ContractHeader, ListHeads};
use crate::layout::ObjectShape;
use crate::reader::MemoryReader;
use crate::registry::{Registry, CONTRACT_FIELDS};
use crate::wire::{ImagePlan, MemoryImage, TargetEncoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractState {
    Uninitialized,
    Publishing,
    Published,
}

/// Where the encoded image lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A detached image at a chosen address (dumps, tests, cross-target).
    At(u64),
    /// Leaked into this process at its real address, for the live contract.
    Leaked,
}

#[derive(Debug)]
enum Storage {
    Owned(MemoryImage),
    Leaked { base: u64, bytes: &'static [u8] },
}

/// A frozen contract: the registry it came from and its encoded image.
///
/// The image starts with its own copy of the header, so `header_address()`
/// is the image base.
#[derive(Debug)]
pub struct PublishedContract {
    registry: Registry,
    header: ContractHeader,
    storage: Storage,
}

impl PublishedContract {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn header(&self) -> &ContractHeader {
        &self.header
    }

    pub fn lists(&self) -> ListHeads {
        self.header.lists
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.header.encoding()
    }

    pub fn base(&self) -> u64 {
        match &self.storage {
            Storage::Owned(image) => image.base,
            Storage::Leaked { base, .. } => *base,
        }
    }

    pub fn header_address(&self) -> u64 {
        self.base()
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(image) => &image.bytes,
            Storage::Leaked { bytes, .. } => bytes,
        }
    }

    /// A detached copy of the image, e.g. for a snapshot.
    pub fn to_image(&self) -> MemoryImage {
        MemoryImage::new(self.base(), self.bytes().to_vec())
    }
}

impl MemoryReader for PublishedContract {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        let bytes = self.bytes();
        let start = address
            .checked_sub(self.base())
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|&start| {
                start
                    .checked_add(buf.len())
                    .is_some_and(|end| end <= bytes.len())
            })
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} bytes at {:#x} are outside the contract", buf.len(), address),
                )
            })?;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// Returns the state to `Uninitialized` unless disarmed, including when
/// `populate` unwinds.
struct PublishingGuard<'a> {
    state: &'a Mutex<ContractState>,
    armed: bool,
}

impl Drop for PublishingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock() = ContractState::Uninitialized;
        }
    }
}

/// One contract's lifecycle.
#[derive(Debug)]
pub struct ContractContext {
    encoding: TargetEncoding,
    max_entries: Option<usize>,
    state: Mutex<ContractState>,
    published: OnceLock<PublishedContract>,
}

impl ContractContext {
    /// `max_entries` caps the registry; `None` leaves it unbounded.
    pub const fn new(encoding: TargetEncoding, max_entries: Option<usize>) -> Self {
        Self {
            encoding,
            max_entries,
            state: const_mutex(ContractState::Uninitialized),
            published: OnceLock::new(),
        }
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.encoding
    }

    pub fn state(&self) -> ContractState {
        *self.state.lock()
    }

    pub fn published(&self) -> Option<&PublishedContract> {
        self.published.get()
    }

    /// Run `populate` once and freeze the result.
    pub fn publish<F>(
        &self,
        populate: F,
        placement: Placement,
    ) -> Result<&PublishedContract, PublishError>
    where
        F: FnOnce(&ObjectShape, &mut Registry),
    {
        {
            let mut state = self.state.lock();
            match *state {
                ContractState::Published => return Err(PublishError::AlreadyPublished),
                ContractState::Publishing => return Err(PublishError::InProgress),
                ContractState::Uninitialized => *state = ContractState::Publishing,
            }
        }
        let mut guard = PublishingGuard {
            state: &self.state,
            armed: true,
        };

        // An error or unwind from here drops the guard still armed
        let contract = self.build(populate, placement)?;
        let contract = self.published.get_or_init(|| contract);
        *self.state.lock() = ContractState::Published;
        guard.armed = false;
        info!(
            "published contract {} ({}) at {:#x}: {} type entries, {} globals",
            contract.header.prefix.version,
            self.encoding,
            contract.header_address(),
            contract.registry.type_count(),
            contract.registry.global_count()
        );
        Ok(contract)
    }

    fn build<F>(
        &self,
        populate: F,
        placement: Placement,
    ) -> Result<PublishedContract, PublishError>
    where
        F: FnOnce(&ObjectShape, &mut Registry),
    {
        let shape = ObjectShape::new(self.encoding.pointer_width);
        let mut registry = match self.max_entries {
            Some(max) => Registry::with_budget(max),
            None => Registry::new(),
        };
        populate(&shape, &mut registry);
        if let Some(err) = registry.rejected().first() {
            return Err(err.clone().into());
        }

        check_list_links(&registry);
        for fact in CONTRACT_FIELDS {
            check_offset_in_type(&registry, fact.type_name, fact.field_name);
        }
        if registry.is_truncated() {
            warn!(
                "contract published with {} entries dropped; readers will see them as unknown",
                registry.dropped()
            );
        }

        let (storage, lists) = {
            let plan = ImagePlan::new(&registry, self.encoding, true);
            match placement {
                Placement::At(base) => {
                    let (image, lists) = plan.encode(base)?;
                    (Storage::Owned(image), lists)
                }
                Placement::Leaked => {
                    let buf: &'static mut [u8] =
                        Box::leak(vec![0u8; plan.total_size()].into_boxed_slice());
                    let base = buf.as_ptr() as usize as u64;
                    let lists = plan.encode_into(buf, base)?;
                    let bytes: &'static [u8] = buf;
                    (Storage::Leaked { base, bytes }, lists)
                }
            }
        };

        Ok(PublishedContract {
            header: ContractHeader::new(self.encoding).with_lists(lists),
            registry,
            storage,
        })
    }
}
