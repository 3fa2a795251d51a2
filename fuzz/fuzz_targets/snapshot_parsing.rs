// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Snapshot file parsing under adversarial input.
//!
//! Truncated headers, region lengths past the end, overlapping regions and
//! CRCs that lie must all come back as `Err`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rtdbg::{MemoryReader, Snapshot};

fuzz_target!(|data: &[u8]| {
    if let Ok(snapshot) = Snapshot::from_bytes(data) {
        // Anything that parsed must survive a save and reload
        let bytes = snapshot.to_bytes().expect("parsed snapshot re-encodes");
        let reloaded = Snapshot::from_bytes(&bytes).expect("re-encoded snapshot parses");
        assert_eq!(reloaded, snapshot);

        for region in snapshot.memory().regions() {
            let mut buf = vec![0u8; region.len()];
            snapshot
                .read_at(region.base, &mut buf)
                .expect("mapped region reads");
            assert_eq!(buf, region.bytes);
        }
    }
});
