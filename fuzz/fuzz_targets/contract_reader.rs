// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The contract reader against hostile target memory.
//!
//! A debugger attaches to processes it does not trust. Whatever bytes sit at
//! the header address, the reader must come back with a cookie mismatch or an
//! error, never a panic or an unbounded walk.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rtdbg::{ContractReader, MemoryImage, ObjectReader, ReaderLimits};

#[derive(Debug, Arbitrary)]
struct Input {
    base: u32,
    header_offset: u16,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let base = u64::from(input.base);
    let image = MemoryImage::new(base, input.bytes);
    let limits = ReaderLimits {
        max_list_len: 4096,
        ..ReaderLimits::default()
    };
    let reader = ContractReader::new().with_limits(limits);

    if let Ok(Some(view)) = reader.read(&image, base + u64::from(input.header_offset)) {
        // Bounded walks stay bounded
        assert!(view.types.len() <= limits.max_list_len);
        assert!(view.globals.len() <= limits.max_list_len);

        // Lookups agree with the first fact in list order
        for fact in &view.types {
            assert!(view.field(&fact.type_name, &fact.field_name).is_some());
        }

        if let Ok(objects) = ObjectReader::new(&view) {
            for global in &view.globals {
                let _ = objects.read_object(&image, global.address);
            }
        }
    }
});
