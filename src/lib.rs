//! Versioned in-memory debug contract for out-of-process runtime diagnostics.
//!
//! A managed runtime publishes, at a well-known symbol, a small header that
//! points at two linked lists: `(type, field, offset)` facts and
//! `(name, address)` globals. A debugger or crash-dump analyzer reads the
//! header out of a target process or a dump, checks the cookie and version,
//! and walks the lists to learn where things live. It never has to be
//! compiled against the runtime it inspects.
//!
//! # Architecture
//!
//! ```text
//!  in-process                                   out-of-process
//! ┌─────────────┐   ┌─────────────┐            ┌──────────────────┐
//! │  registry   │──▶│    wire     │──▶ image ──▶│ reader::contract │
//! │ (table,     │   │ (ImagePlan, │   bytes     │ (probe, walk,    │
//! │  sources)   │   │  encoding)  │     │       │  ContractView)   │
//! └─────────────┘   └─────────────┘     │       └────────┬─────────┘
//!        ▲                 ▲            │                ▼
//! ┌─────────────┐   ┌─────────────┐     │       ┌──────────────────┐
//! │   layout    │   │   header    │     │       │  reader::object  │
//! │(ObjectShape,│   │ (NADH, 1.0, │     │       │ (ObjectInfo via  │
//! │ HeapObject) │   │  flags)     │     ▼       │  object_size)    │
//! └─────────────┘   └─────────────┘  snapshot   └──────────────────┘
//!        │                                │
//!        ▼                                ▼
//! ┌─────────────────────────────┐   ┌─────────────┐
//! │ context / process           │   │ versioning  │
//! │ (publish once, exported     │   │ (manifest,  │
//! │  RTDBG_RUNTIME_DEBUG_HEADER)│   │  diff, bump)│
//! └─────────────────────────────┘   └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rtdbg::{populate_debug_headers, RuntimeGlobals};
//!
//! let globals = RuntimeGlobals::new().with("g_pTheRuntimeInstance", runtime_addr);
//! populate_debug_headers(&globals, &[&my_thread_manager])?;
//! ```
//!
//! And from a debugger:
//!
//! ```ignore
//! use rtdbg::{ContractReader, Snapshot};
//!
//! let dump = Snapshot::read_from_file(path)?;
//! if let Some(view) = ContractReader::new().read(&dump, dump.header_address())? {
//!     let length_offset = view.field("Array", "m_Length");
//! }
//! ```

// Module declarations
pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod header;
pub mod layout;
pub mod process;
pub mod reader;
pub mod registry;
pub mod sample;
pub mod snapshot;
pub mod testing;
pub mod versioning;
pub mod wire;

// Re-exports for public API
pub use config::ContractConfig;
pub use context::{ContractContext, ContractState, Placement, PublishedContract};
pub use error::{LayoutError, PublishError, ReadError, RegistryError};
pub use header::{ContractHeader, ContractVersion, HeaderFlags, HeaderPrefix, ListHeads, Magic};
pub use layout::{object_size, HeapObject, ObjHeader, ObjectShape, TypeDescriptor, TypeFlags};
pub use process::{
    header_address, populate_debug_headers, published, self_memory, RTDBG_RUNTIME_DEBUG_HEADER,
};
pub use reader::{
    ContractReader, ContractView, MemoryReader, ObjectInfo, ObjectReader, Probe, ReaderLimits,
    RegionMemory, ThreadInfo, ThreadListReader, TypeInfo,
};
pub use registry::{populate, ContractSource, FieldKind, Registry, RuntimeGlobals};
pub use snapshot::Snapshot;
pub use versioning::{
    check_version_bump, diff_manifests, required_bump, Bump, Change, LayoutManifest,
    PolicyViolation,
};
pub use wire::{Endianness, ImagePlan, MemoryImage, PointerWidth, TargetEncoding};

#[cfg(test)]
mod tests {
    //! Cross-module properties: whatever the registry holds, the reader sees.

    use super::*;
    use proptest::prelude::*;
    use proptest::string::string_regex;

    fn encoding_strategy() -> impl Strategy<Value = TargetEncoding> {
        prop::sample::select(TargetEncoding::ALL.to_vec())
    }

    fn pairs_strategy() -> impl Strategy<Value = Vec<(String, String, u32)>> {
        let name = || string_regex("[A-Za-z_][A-Za-z0-9_]{0,24}").unwrap();
        prop::collection::vec((name(), name(), 0u32..4096), 0..64)
    }

    fn read_back(registry: &Registry, enc: TargetEncoding) -> ContractView {
        let (image, _) = ImagePlan::new(registry, enc, true).encode(0x7000_0000).unwrap();
        ContractReader::new()
            .read(&image, image.base)
            .unwrap()
            .expect("cookie matches")
    }

    proptest! {
        #[test]
        fn every_registered_pair_is_read_back(enc in encoding_strategy(), pairs in pairs_strategy()) {
            let mut registry = Registry::new();
            for (ty, field, offset) in &pairs {
                registry.register_field(ty.clone(), field.clone(), *offset);
            }
            let view = read_back(&registry, enc);

            prop_assert_eq!(view.types.len(), pairs.len());
            // Traversal is reverse registration order
            for (fact, (ty, field, offset)) in view.types.iter().zip(pairs.iter().rev()) {
                prop_assert_eq!(&fact.type_name, ty);
                prop_assert_eq!(&fact.field_name, field);
                prop_assert_eq!(fact.field_offset, *offset);
            }
        }

        #[test]
        fn lookup_returns_latest_registration(enc in encoding_strategy(), pairs in pairs_strategy()) {
            let mut registry = Registry::new();
            for (ty, field, offset) in &pairs {
                registry.register_field(ty.clone(), field.clone(), *offset);
            }
            let view = read_back(&registry, enc);

            for (ty, field, _) in &pairs {
                let latest = pairs
                    .iter()
                    .rev()
                    .find(|(t, f, _)| t == ty && f == field)
                    .map(|(_, _, o)| *o);
                prop_assert_eq!(view.field(ty, field), latest);
                prop_assert_eq!(registry.field(ty, field), latest);
            }
        }

        #[test]
        fn globals_round_trip_within_width(
            enc in encoding_strategy(),
            addresses in prop::collection::vec(any::<u64>(), 0..16),
        ) {
            let mut registry = Registry::new();
            let mask = enc.pointer_width.max_address();
            for (i, address) in addresses.iter().enumerate() {
                registry.register_global(format!("g_{}", i), address & mask);
            }
            let view = read_back(&registry, enc);
            for (i, address) in addresses.iter().enumerate() {
                prop_assert_eq!(view.global(&format!("g_{}", i)), Some(address & mask));
            }
        }

        #[test]
        fn object_size_is_base_plus_elements(base in any::<u32>(), component in any::<u16>(), length in any::<u32>()) {
            let size = object_size(base, component, length);
            if component == 0 {
                prop_assert_eq!(size, u64::from(base));
            } else {
                prop_assert_eq!(size, u64::from(base) + u64::from(length) * u64::from(component));
            }
            prop_assert!(size >= u64::from(base));
        }
    }
}
