// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Arbitrary registrations survive encode and read back intact.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rtdbg::{ContractReader, ImagePlan, ReaderLimits, Registry, TargetEncoding};

#[derive(Debug, Arbitrary)]
enum Op {
    Field(String, String, u32),
    Global(String, u64),
}

#[derive(Debug, Arbitrary)]
struct Input {
    encoding: u8,
    budget: Option<u8>,
    ops: Vec<Op>,
}

fn readable(name: &str) -> bool {
    !name.contains('\0') && name.len() <= ReaderLimits::default().max_name_len
}

fuzz_target!(|input: Input| {
    let enc = TargetEncoding::ALL[usize::from(input.encoding) % TargetEncoding::ALL.len()];
    let mut registry = match input.budget {
        Some(n) => Registry::with_budget(usize::from(n)),
        None => Registry::new(),
    };
    for op in input.ops {
        match op {
            // Names must survive as C strings within the reader's limit
            Op::Field(ty, field, offset) => {
                if readable(&ty) && readable(&field) {
                    registry.register_field(ty, field, offset);
                }
            }
            Op::Global(name, address) => {
                if readable(&name) {
                    registry.register_global(name, address & enc.pointer_width.max_address());
                }
            }
        }
    }

    let Ok((image, _)) = ImagePlan::new(&registry, enc, true).encode(0x1000) else {
        return;
    };
    let view = ContractReader::new()
        .read(&image, 0x1000)
        .expect("own image reads")
        .expect("own cookie matches");
    assert_eq!(view.types.len(), registry.type_count());
    assert_eq!(view.globals.len(), registry.global_count());
    for (_, entry) in registry.types() {
        assert!(view.field(entry.type_name(), entry.field_name()).is_some());
    }
});
