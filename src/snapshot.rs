// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Snapshot files: a target's contract memory, saved for offline inspection.
//!
//! A snapshot is the header address plus the memory regions a reader needs
//! to walk the contract from there. It is not a core dump; it holds only what
//! was put into it.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ "RTDS"  version u8  reserved u8×3            │  header, 20 bytes
//! │ header_address u64 LE   region_count u32 LE  │
//! ├──────────────────────────────────────────────┤
//! │ base u64 LE  len u32 LE  bytes[len]          │  × region_count
//! ├──────────────────────────────────────────────┤
//! │ crc32 u32 LE  "SDTR"                         │  footer, 8 bytes
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The CRC covers everything before the footer. A snapshot that fails the
//! check is rejected whole; there is no partial recovery.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crc32fast::Hasher as Crc32Hasher;
use log::debug;

use crate::reader::{MemoryReader, RegionMemory};
use crate::wire::MemoryImage;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Magic bytes: "RTDS"
pub const MAGIC: [u8; 4] = [0x52, 0x54, 0x44, 0x53];

/// Footer magic: "SDTR" (reversed)
pub const FOOTER_MAGIC: [u8; 4] = [0x53, 0x44, 0x54, 0x52];

pub const VERSION: u8 = 1;

// ============================================================================
// SECURITY LIMITS (snapshots come from other machines)
// ============================================================================

/// Maximum snapshot size: 64 MB
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

/// Maximum number of regions
pub const MAX_REGIONS: u32 = 4096;

// ============================================================================
// HEADER / FOOTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u8,
    pub header_address: u64,
    pub region_count: u32,
}

impl SnapshotHeader {
    // 4 (magic) + 1 (version) + 3 (reserved) + 8 (address) + 4 (count)
    pub const SIZE: usize = 20;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&[self.version])?;
        w.write_all(&[0u8; 3])?;
        w.write_all(&self.header_address.to_le_bytes())?;
        w.write_all(&self.region_count.to_le_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid magic: expected RTDS, got {:?}", magic),
            ));
        }

        let mut buf = [0u8; 16];
        r.read_exact(&mut buf)?;
        let version = buf[0];
        if version != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported snapshot version {} (expected {})", version, VERSION),
            ));
        }
        if buf[1..4] != [0u8; 3] {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Reserved snapshot header bytes must be zero",
            ));
        }
        let header_address = u64::from_le_bytes([
            buf[4], buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11],
        ]);
        let region_count = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        if region_count > MAX_REGIONS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Too many regions: {} (max {})", region_count, MAX_REGIONS),
            ));
        }

        Ok(Self {
            version,
            header_address,
            region_count,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotFooter {
    pub crc32: u32,
}

impl SnapshotFooter {
    pub const SIZE: usize = 8;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&FOOTER_MAGIC)?;
        Ok(())
    }

    pub fn read(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "File too short for footer",
            ));
        }
        let footer_start = bytes.len() - Self::SIZE;

        let magic = &bytes[footer_start + 4..];
        if magic != FOOTER_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid footer magic: expected SDTR, got {:?}", magic),
            ));
        }

        let crc32 = u32::from_le_bytes([
            bytes[footer_start],
            bytes[footer_start + 1],
            bytes[footer_start + 2],
            bytes[footer_start + 3],
        ]);
        Ok(Self { crc32 })
    }

    pub fn compute_crc32(data: &[u8]) -> u32 {
        let mut hasher = Crc32Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Saved contract memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    header_address: u64,
    memory: RegionMemory,
}

impl Snapshot {
    pub fn new(header_address: u64, memory: RegionMemory) -> Self {
        Self {
            header_address,
            memory,
        }
    }

    /// Where a reader should start.
    pub fn header_address(&self) -> u64 {
        self.header_address
    }

    pub fn memory(&self) -> &RegionMemory {
        &self.memory
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let regions = self.memory.regions();
        let region_count = u32::try_from(regions.len())
            .ok()
            .filter(|&n| n <= MAX_REGIONS)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Too many regions: {} (max {})", regions.len(), MAX_REGIONS),
                )
            })?;

        let mut out = Vec::with_capacity(
            SnapshotHeader::SIZE + self.memory.mapped_len() + 12 * regions.len(),
        );
        SnapshotHeader {
            version: VERSION,
            header_address: self.header_address,
            region_count,
        }
        .write(&mut out)?;

        for region in regions {
            let len = u32::try_from(region.len()).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Region at {:#x} is larger than 4 GB", region.base),
                )
            })?;
            out.write_all(&region.base.to_le_bytes())?;
            out.write_all(&len.to_le_bytes())?;
            out.write_all(&region.bytes)?;
        }

        let crc32 = SnapshotFooter::compute_crc32(&out);
        SnapshotFooter { crc32 }.write(&mut out)?;

        if out.len() > MAX_SNAPSHOT_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Snapshot too large: {} bytes (max {})",
                    out.len(),
                    MAX_SNAPSHOT_SIZE
                ),
            ));
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() > MAX_SNAPSHOT_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Snapshot too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_SNAPSHOT_SIZE
                ),
            ));
        }
        if bytes.len() < SnapshotHeader::SIZE + SnapshotFooter::SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "File too short for snapshot header and footer",
            ));
        }

        let footer = SnapshotFooter::read(bytes)?;
        let body = &bytes[..bytes.len() - SnapshotFooter::SIZE];
        let computed = SnapshotFooter::compute_crc32(body);
        if computed != footer.crc32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "CRC32 mismatch: expected {:#010x}, got {:#010x}",
                    footer.crc32, computed
                ),
            ));
        }

        let mut cursor = io::Cursor::new(body);
        let header = SnapshotHeader::read(&mut cursor)?;
        let mut memory = RegionMemory::new();
        for _ in 0..header.region_count {
            let mut prefix = [0u8; 12];
            cursor.read_exact(&mut prefix)?;
            let base = u64::from_le_bytes([
                prefix[0], prefix[1], prefix[2], prefix[3], prefix[4], prefix[5], prefix[6],
                prefix[7],
            ]);
            let len = u32::from_le_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]) as usize;

            let remaining = body.len() - cursor.position() as usize;
            if len > remaining {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "Region at {:#x} claims {} bytes, {} remain",
                        base, len, remaining
                    ),
                ));
            }
            let mut data = vec![0u8; len];
            cursor.read_exact(&mut data)?;
            memory.map(MemoryImage::new(base, data))?;
        }

        if cursor.position() as usize != body.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} trailing bytes after last region",
                    body.len() - cursor.position() as usize
                ),
            ));
        }

        debug!(
            "loaded snapshot: {} regions, {} bytes mapped, header at {:#x}",
            header.region_count,
            memory.mapped_len(),
            header.header_address
        );
        Ok(Self {
            header_address: header.header_address,
            memory,
        })
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes()?)
    }

    pub fn read_from_file(path: &Path) -> io::Result<Self> {
        let len = fs::metadata(path)?.len();
        if len > MAX_SNAPSHOT_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Snapshot too large: {} bytes (max {})", len, MAX_SNAPSHOT_SIZE),
            ));
        }
        Self::from_bytes(&fs::read(path)?)
    }
}

impl MemoryReader for Snapshot {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        self.memory.read_at(address, buf)
    }
}
