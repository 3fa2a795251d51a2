// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Target memory access.
//!
//! A reader never assumes the target is its own process. Everything goes
//! through `MemoryReader`, which a debugger backs with ptrace or a minidump,
//! and which this crate backs with images and snapshot regions.

use std::io;

use crate::wire::MemoryImage;

/// Read-only access to a target's address space.
pub trait MemoryReader {
    /// Fill `buf` from `address`. Partial reads are errors.
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: MemoryReader + ?Sized> MemoryReader for &T {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(address, buf)
    }
}

impl MemoryReader for MemoryImage {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        if !self.contains(address, buf.len()) {
            return Err(unmapped(address, buf.len()));
        }
        let start = (address - self.base) as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// A sparse address space made of non-overlapping images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionMemory {
    regions: Vec<MemoryImage>,
}

impl RegionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `image`. Fails if it overlaps a region already mapped.
    pub fn map(&mut self, image: MemoryImage) -> io::Result<()> {
        if image.base.checked_add(image.len() as u64).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("region at {:#x} wraps the address space", image.base),
            ));
        }
        let pos = self.regions.partition_point(|r| r.base < image.base);
        let overlaps_prev = pos > 0 && self.regions[pos - 1].end() > image.base;
        let overlaps_next = self
            .regions
            .get(pos)
            .is_some_and(|next| image.end() > next.base);
        if overlaps_prev || overlaps_next {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "region {:#x}..{:#x} overlaps an existing region",
                    image.base,
                    image.end()
                ),
            ));
        }
        self.regions.insert(pos, image);
        Ok(())
    }

    pub fn with(mut self, image: MemoryImage) -> io::Result<Self> {
        self.map(image)?;
        Ok(self)
    }

    /// Regions in address order.
    pub fn regions(&self) -> &[MemoryImage] {
        &self.regions
    }

    pub fn into_regions(self) -> Vec<MemoryImage> {
        self.regions
    }

    /// Total mapped bytes.
    pub fn mapped_len(&self) -> usize {
        self.regions.iter().map(MemoryImage::len).sum()
    }
}

impl MemoryReader for RegionMemory {
    fn read_at(&self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        let pos = self.regions.partition_point(|r| r.base <= address);
        match pos.checked_sub(1).map(|i| &self.regions[i]) {
            Some(region) => region.read_at(address, buf),
            None => Err(unmapped(address, buf.len())),
        }
    }
}

fn unmapped(address: u64, len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{} bytes at {:#x} are not mapped", len, address),
    )
}
