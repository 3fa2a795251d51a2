//! Shared test utilities and fixtures.

#![allow(dead_code)]

use rtdbg::reader::RegionMemory;
use rtdbg::{
    ContractReader, ContractView, Endianness, ImagePlan, MemoryImage, PointerWidth, Registry,
    RuntimeGlobals, TargetEncoding,
};

// Re-export canonical test utilities from rtdbg::testing
pub use rtdbg::testing::{
    encode_with_header, header_only, pairs_registry, table_registry, CountingMemory, FIXTURE_BASE,
};

// ============================================================================
// ENCODINGS
// ============================================================================

pub const LE32: TargetEncoding = TargetEncoding::new(PointerWidth::Four, Endianness::Little);
pub const BE32: TargetEncoding = TargetEncoding::new(PointerWidth::Four, Endianness::Big);
pub const LE64: TargetEncoding = TargetEncoding::new(PointerWidth::Eight, Endianness::Little);
pub const BE64: TargetEncoding = TargetEncoding::new(PointerWidth::Eight, Endianness::Big);

// ============================================================================
// FIXTURES
// ============================================================================

/// Globals a typical runtime publishes.
pub fn runtime_globals() -> RuntimeGlobals {
    RuntimeGlobals::new()
        .with("g_pTheRuntimeInstance", 0x0020_0000)
        .with("g_gcDacGlobals", 0x0020_0100)
        .with("g_pFreeObjectEEType", 0x0020_0200)
        .with("g_stressLog", 0x0020_0300)
        .with("moduleBaseAddress", 0x0040_0000)
}

/// Encode and read back `registry` for `enc`.
pub fn read_back(registry: &Registry, enc: TargetEncoding) -> ContractView {
    let image = encode_with_header(registry, enc);
    ContractReader::new()
        .read(&image, image.base)
        .expect("contract reads")
        .expect("cookie matches")
}

/// An image without its header, plus a separately placed header pointing at it.
pub fn detached_header(registry: &Registry, enc: TargetEncoding) -> (RegionMemory, u64) {
    let (lists_image, lists) = ImagePlan::new(registry, enc, false)
        .encode(0x0080_0000)
        .expect("lists encode");
    let header = rtdbg::ContractHeader::new(enc).with_lists(lists);
    let header_image = MemoryImage::new(FIXTURE_BASE, header.encode().expect("header encodes"));
    let memory = RegionMemory::new()
        .with(lists_image)
        .expect("lists map")
        .with(header_image)
        .expect("header maps");
    (memory, FIXTURE_BASE)
}
