// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The contract header: cookie, version, flags, and list heads.
//!
//! The first 16 bytes are fixed forever and always little-endian, whatever the
//! host. A debugger reads them before it knows anything else about the target:
//! the cookie tells it whether the runtime is there at all, the major version
//! whether it can parse the rest, and the flags how wide and in which byte
//! order every pointer after byte 16 is.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  0..4   cookie           "NADH"                            │
//! │  4..6   major_version    u16 LE   breaking changes          │
//! │  6..8   minor_version    u16 LE   compatible changes        │
//! │  8..12  flags            u32 LE   bit0: 8-byte pointers     │
//! │                                   bit1: big-endian          │
//! │ 12..16  reserved_padding u32      zero                      │
//! ├────────────────────────────────────────────────────────────┤
//! │ 16..    debug_types_list ptr      (target width and order)  │
//! │         globals_list     ptr                                │
//! │         defines_list     ptr      always null               │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Breaking vs. compatible
//!
//! Removing or reordering anything here, or changing the type or meaning of a
//! field, bumps the major version. Appending a pointer slot at the end, or
//! giving a reserved flag bit a documented meaning, bumps the minor version.
//! See `versioning` for the full table.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contracts::check_flags_defined;
use crate::error::ReadError;
use crate::wire::{get_u16_le, get_u32_le, Endianness, PointerWidth, TargetEncoding};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Size of the fixed little-endian prefix.
pub const HEADER_PREFIX_SIZE: usize = 16;

/// Number of pointer slots after the prefix.
pub const HEADER_POINTER_SLOTS: usize = 3;

// ============================================================================
// MAGIC
// ============================================================================

/// Four-byte cookie identifying a contract format generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Magic(pub [u8; 4]);

impl Magic {
    /// List-based header ("NADH"). The generation this crate publishes.
    pub const LIST_HEADER: Magic = Magic([0x4E, 0x41, 0x44, 0x48]);

    /// Per-subsystem header ("nf16"). Known by name only; never parsed.
    pub const SUBSYSTEM_HEADER: Magic = Magic([0x6e, 0x66, 0x31, 0x36]);

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// Human name for a known generation.
    pub fn generation(self) -> Option<&'static str> {
        match self {
            Magic::LIST_HEADER => Some("list-based"),
            Magic::SUBSYSTEM_HEADER => Some("per-subsystem"),
            _ => None,
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic()) {
            for &b in &self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(
                f,
                "{:02x} {:02x} {:02x} {:02x}",
                self.0[0], self.0[1], self.0[2], self.0[3]
            )
        }
    }
}

impl fmt::Debug for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Magic({})", self)
    }
}

// ============================================================================
// VERSION
// ============================================================================

/// Major/minor version pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ContractVersion {
    pub major: u16,
    pub minor: u16,
}

impl ContractVersion {
    /// The version this build publishes.
    pub const CURRENT: ContractVersion = ContractVersion::new(1, 0);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Can a reader that understands major versions up to `max_major` parse this?
    pub const fn is_supported_by(self, max_major: u16) -> bool {
        self.major <= max_major
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ContractVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("expected MAJOR.MINOR, got '{}'", s))?;
        let major = major
            .trim()
            .parse()
            .map_err(|e| format!("bad major version '{}': {}", major, e))?;
        let minor = minor
            .trim()
            .parse()
            .map_err(|e| format!("bad minor version '{}': {}", minor, e))?;
        Ok(Self { major, minor })
    }
}

// ============================================================================
// FLAGS
// ============================================================================

/// Header flags word.
///
/// Bits outside `DEFINED` are reserved and zero. Giving one of them a meaning
/// later is a minor-version change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderFlags(pub u32);

impl HeaderFlags {
    pub const POINTER_SIZE_8: u32 = 0b0000_0001;
    pub const BIG_ENDIAN: u32 = 0b0000_0010;

    /// Every bit with a meaning in version 1.0.
    pub const DEFINED: u32 = Self::POINTER_SIZE_8 | Self::BIG_ENDIAN;

    pub const fn for_encoding(enc: TargetEncoding) -> Self {
        let mut bits = 0;
        if let PointerWidth::Eight = enc.pointer_width {
            bits |= Self::POINTER_SIZE_8;
        }
        if let Endianness::Big = enc.endianness {
            bits |= Self::BIG_ENDIAN;
        }
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn pointer_width(self) -> PointerWidth {
        if self.0 & Self::POINTER_SIZE_8 != 0 {
            PointerWidth::Eight
        } else {
            PointerWidth::Four
        }
    }

    pub fn endianness(self) -> Endianness {
        if self.0 & Self::BIG_ENDIAN != 0 {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// The encoding every pointer after the prefix uses.
    pub fn encoding(self) -> TargetEncoding {
        TargetEncoding::new(self.pointer_width(), self.endianness())
    }

    pub const fn reserved_bits(self) -> u32 {
        self.0 & !Self::DEFINED
    }

    /// All bits outside the defined set must be zero.
    pub fn validate(self) -> Result<(), ReadError> {
        match self.reserved_bits() {
            0 => Ok(()),
            bits => Err(ReadError::ReservedFlags { bits }),
        }
    }
}

// ============================================================================
// HEADER
// ============================================================================

/// Decoded fixed prefix. Everything a reader may trust before looking at flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPrefix {
    pub magic: Magic,
    pub version: ContractVersion,
    pub flags: HeaderFlags,
    pub reserved_padding: u32,
}

impl HeaderPrefix {
    pub fn decode(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_PREFIX_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "header prefix needs {} bytes, got {}",
                    HEADER_PREFIX_SIZE,
                    bytes.len()
                ),
            ));
        }
        Ok(Self {
            magic: Magic([bytes[0], bytes[1], bytes[2], bytes[3]]),
            version: ContractVersion::new(get_u16_le(bytes, 4)?, get_u16_le(bytes, 6)?),
            flags: HeaderFlags(get_u32_le(bytes, 8)?),
            reserved_padding: get_u32_le(bytes, 12)?,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_PREFIX_SIZE] {
        let mut out = [0u8; HEADER_PREFIX_SIZE];
        out[0..4].copy_from_slice(&self.magic.0);
        out[4..6].copy_from_slice(&self.version.major.to_le_bytes());
        out[6..8].copy_from_slice(&self.version.minor.to_le_bytes());
        out[8..12].copy_from_slice(&self.flags.0.to_le_bytes());
        out[12..16].copy_from_slice(&self.reserved_padding.to_le_bytes());
        out
    }
}

/// List-head addresses. Zero is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListHeads {
    pub debug_types_list: u64,
    pub globals_list: u64,
    pub defines_list: u64,
}

impl ListHeads {
    pub fn is_null(&self) -> bool {
        self.debug_types_list == 0 && self.globals_list == 0
    }
}

/// The whole header as written into a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractHeader {
    pub prefix: HeaderPrefix,
    pub lists: ListHeads,
}

impl ContractHeader {
    /// Constant fields for `enc`, null list heads.
    pub fn new(enc: TargetEncoding) -> Self {
        Self {
            prefix: HeaderPrefix {
                magic: Magic::LIST_HEADER,
                version: ContractVersion::CURRENT,
                flags: HeaderFlags::for_encoding(enc),
                reserved_padding: 0,
            },
            lists: ListHeads::default(),
        }
    }

    pub fn with_lists(mut self, lists: ListHeads) -> Self {
        self.lists = lists;
        self
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.prefix.flags.encoding()
    }

    /// Encoded size for a pointer width.
    pub const fn size(width: PointerWidth) -> usize {
        HEADER_PREFIX_SIZE + HEADER_POINTER_SLOTS * width.bytes()
    }

    /// Offset of pointer slot `index` (0 = types, 1 = globals, 2 = defines).
    pub const fn slot_offset(width: PointerWidth, index: usize) -> usize {
        HEADER_PREFIX_SIZE + index * width.bytes()
    }

    pub fn encode_into(&self, out: &mut [u8]) -> io::Result<()> {
        check_flags_defined(self.prefix.flags);
        let enc = self.encoding();
        let size = Self::size(enc.pointer_width);
        if out.len() < size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("header needs {} bytes, buffer has {}", size, out.len()),
            ));
        }
        out[..HEADER_PREFIX_SIZE].copy_from_slice(&self.prefix.encode());
        let slots = [
            self.lists.debug_types_list,
            self.lists.globals_list,
            self.lists.defines_list,
        ];
        for (i, value) in slots.into_iter().enumerate() {
            enc.put_ptr(out, Self::slot_offset(enc.pointer_width, i), value)?;
        }
        Ok(())
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; Self::size(self.encoding().pointer_width)];
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode the pointer slots that follow an already-validated prefix.
    pub fn decode_lists(prefix: HeaderPrefix, bytes: &[u8]) -> io::Result<Self> {
        let enc = prefix.flags.encoding();
        let w = enc.pointer_width;
        Ok(Self {
            prefix,
            lists: ListHeads {
                debug_types_list: enc.get_ptr(bytes, Self::slot_offset(w, 0))?,
                globals_list: enc.get_ptr(bytes, Self::slot_offset(w, 1))?,
                defines_list: enc.get_ptr(bytes, Self::slot_offset(w, 2))?,
            },
        })
    }
}
