// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Target encoding primitives: pointer width, byte order, and fixed-width fields.
//!
//! The contract is read by tools that may run on a different architecture than
//! the process they inspect. So nothing here uses the host's native struct
//! layout. Every field goes through a `TargetEncoding`, which says how wide a
//! pointer is and which end of a word comes first.
//!
//! The one exception is the header prefix (cookie, versions, flags), which is
//! always little-endian. That lives in `header.rs` and calls the `*_le` helpers
//! below directly.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

// ============================================================================
// POINTER WIDTH
// ============================================================================

/// Size of a pointer-valued field in the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PointerWidth {
    Four,
    Eight,
}

impl PointerWidth {
    /// Pointer width of the process this code is compiled into.
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            PointerWidth::Eight
        } else {
            PointerWidth::Four
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            4 => Some(PointerWidth::Four),
            8 => Some(PointerWidth::Eight),
            _ => None,
        }
    }

    /// Largest address representable at this width.
    pub const fn max_address(self) -> u64 {
        match self {
            PointerWidth::Four => u32::MAX as u64,
            PointerWidth::Eight => u64::MAX,
        }
    }
}

impl TryFrom<u8> for PointerWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_bytes(value as usize)
            .ok_or_else(|| format!("pointer width must be 4 or 8, got {}", value))
    }
}

impl From<PointerWidth> for u8 {
    fn from(width: PointerWidth) -> u8 {
        width.bytes() as u8
    }
}

// ============================================================================
// ENDIANNESS
// ============================================================================

/// Byte order of multi-byte fields in the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

impl std::str::FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Endianness::Little),
            "big" | "be" => Ok(Endianness::Big),
            other => Err(format!("unknown endianness '{}' (expected little or big)", other)),
        }
    }
}

// ============================================================================
// TARGET ENCODING
// ============================================================================

/// How pointer-valued and multi-byte fields are laid out in a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetEncoding {
    pub pointer_width: PointerWidth,
    pub endianness: Endianness,
}

impl Default for TargetEncoding {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for TargetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.endianness {
            Endianness::Little => "little-endian",
            Endianness::Big => "big-endian",
        };
        write!(f, "{}-bit {}", self.pointer_width.bytes() * 8, order)
    }
}

impl TargetEncoding {
    pub const fn new(pointer_width: PointerWidth, endianness: Endianness) -> Self {
        Self {
            pointer_width,
            endianness,
        }
    }

    /// Encoding of the running process.
    pub const fn host() -> Self {
        Self::new(PointerWidth::host(), Endianness::host())
    }

    /// All four (width, order) combinations. Handy for exhaustive tests.
    pub const ALL: [TargetEncoding; 4] = [
        TargetEncoding::new(PointerWidth::Four, Endianness::Little),
        TargetEncoding::new(PointerWidth::Four, Endianness::Big),
        TargetEncoding::new(PointerWidth::Eight, Endianness::Little),
        TargetEncoding::new(PointerWidth::Eight, Endianness::Big),
    ];

    #[inline]
    pub const fn pointer_size(self) -> usize {
        self.pointer_width.bytes()
    }

    pub fn put_u16(self, buf: &mut [u8], at: usize, value: u16) -> io::Result<()> {
        let bytes = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        slot_mut(buf, at, 2)?.copy_from_slice(&bytes);
        Ok(())
    }

    pub fn put_u32(self, buf: &mut [u8], at: usize, value: u32) -> io::Result<()> {
        let bytes = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        slot_mut(buf, at, 4)?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Write a pointer-sized field.
    ///
    /// Returns an error if `value` does not fit the target pointer width, so a
    /// 64-bit address can never be silently truncated into a 32-bit image.
    pub fn put_ptr(self, buf: &mut [u8], at: usize, value: u64) -> io::Result<()> {
        if value > self.pointer_width.max_address() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "address {:#x} does not fit a {}-byte pointer",
                    value,
                    self.pointer_size()
                ),
            ));
        }
        match self.pointer_width {
            PointerWidth::Four => self.put_u32(buf, at, value as u32),
            PointerWidth::Eight => {
                let bytes = match self.endianness {
                    Endianness::Little => value.to_le_bytes(),
                    Endianness::Big => value.to_be_bytes(),
                };
                slot_mut(buf, at, 8)?.copy_from_slice(&bytes);
                Ok(())
            }
        }
    }

    pub fn get_u16(self, bytes: &[u8], at: usize) -> io::Result<u16> {
        let raw: [u8; 2] = slot(bytes, at, 2)?.try_into().map_err(invalid_width)?;
        Ok(match self.endianness {
            Endianness::Little => u16::from_le_bytes(raw),
            Endianness::Big => u16::from_be_bytes(raw),
        })
    }

    pub fn get_u32(self, bytes: &[u8], at: usize) -> io::Result<u32> {
        let raw: [u8; 4] = slot(bytes, at, 4)?.try_into().map_err(invalid_width)?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(raw),
            Endianness::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn get_ptr(self, bytes: &[u8], at: usize) -> io::Result<u64> {
        match self.pointer_width {
            PointerWidth::Four => self.get_u32(bytes, at).map(u64::from),
            PointerWidth::Eight => {
                let raw: [u8; 8] = slot(bytes, at, 8)?.try_into().map_err(invalid_width)?;
                Ok(match self.endianness {
                    Endianness::Little => u64::from_le_bytes(raw),
                    Endianness::Big => u64::from_be_bytes(raw),
                })
            }
        }
    }
}

// ============================================================================
// FIXED LITTLE-ENDIAN HELPERS (header prefix, snapshot files)
// ============================================================================

pub fn get_u16_le(bytes: &[u8], at: usize) -> io::Result<u16> {
    TargetEncoding::new(PointerWidth::Four, Endianness::Little).get_u16(bytes, at)
}

pub fn get_u32_le(bytes: &[u8], at: usize) -> io::Result<u32> {
    TargetEncoding::new(PointerWidth::Four, Endianness::Little).get_u32(bytes, at)
}

pub fn get_u64_le(bytes: &[u8], at: usize) -> io::Result<u64> {
    TargetEncoding::new(PointerWidth::Eight, Endianness::Little).get_ptr(bytes, at)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn slot(bytes: &[u8], at: usize, len: usize) -> io::Result<&[u8]> {
    at.checked_add(len)
        .and_then(|end| bytes.get(at..end))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "field at offset {} (+{} bytes) exceeds buffer of {} bytes",
                    at,
                    len,
                    bytes.len()
                ),
            )
        })
}

fn slot_mut(bytes: &mut [u8], at: usize, len: usize) -> io::Result<&mut [u8]> {
    let available = bytes.len();
    at.checked_add(len)
        .and_then(move |end| bytes.get_mut(at..end))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "field at offset {} (+{} bytes) exceeds buffer of {} bytes",
                    at, len, available
                ),
            )
        })
}

fn invalid_width(_: std::array::TryFromSliceError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "field width mismatch")
}
