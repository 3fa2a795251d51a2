//! Publishing: state machine under contention, and the live process contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rtdbg::{
    header_address, populate, populate_debug_headers, published, self_memory, ContractContext,
    ContractReader, ContractSource, ContractState, ObjectShape, Placement, PublishError, Registry,
    TargetEncoding, RTDBG_RUNTIME_DEBUG_HEADER,
};

use crate::common::runtime_globals;

struct CollectorSource;

impl ContractSource for CollectorSource {
    fn name(&self) -> &str {
        "collector"
    }

    fn contribute(&self, shape: &ObjectShape, registry: &mut Registry) {
        registry.register_size("gc_heap", 8 * shape.width().bytes() as u32);
        registry.register_field("gc_heap", "alloc_allocated", 0);
        registry.register_global("g_gcHeap", 0x00AB_0000);
    }
}

#[test]
fn test_racing_publishers_publish_once() {
    let ctx = ContractContext::new(TargetEncoding::host(), None);
    let populated = AtomicUsize::new(0);

    let results: Vec<Result<u64, String>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let ctx = &ctx;
                let populated = &populated;
                s.spawn(move || {
                    ctx.publish(
                        |shape, registry| {
                            populated.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            populate(registry, shape, &runtime_globals(), &[]);
                        },
                        Placement::At(0x0100_0000 * (i + 1)),
                    )
                    .map(|c| c.base())
                    .map_err(|e| e.to_string())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<u64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(populated.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.state(), ContractState::Published);
    assert_eq!(ctx.published().unwrap().base(), winners[0]);
}

#[test]
fn test_sources_contribute_after_table() {
    let ctx = ContractContext::new(TargetEncoding::host(), None);
    let contract = ctx
        .publish(
            |shape, registry| populate(registry, shape, &runtime_globals(), &[&CollectorSource]),
            Placement::At(0x0200_0000),
        )
        .unwrap();
    let view = ContractReader::new()
        .read(contract, contract.header_address())
        .unwrap()
        .unwrap();
    assert_eq!(view.field("gc_heap", "alloc_allocated"), Some(0));
    assert_eq!(view.global("g_gcHeap"), Some(0x00AB_0000));
    // Newest first: the source's entries lead the lists
    assert_eq!(view.types[0].type_name, "gc_heap");
    assert_eq!(view.globals[0].name, "g_gcHeap");
}

#[test]
fn test_live_process_contract() {
    match populate_debug_headers(&runtime_globals(), &[&CollectorSource]) {
        Ok(_) | Err(PublishError::AlreadyPublished) => {}
        Err(err) => panic!("publish failed: {}", err),
    }
    let contract = published().expect("published");
    assert_eq!(RTDBG_RUNTIME_DEBUG_HEADER.lists(), contract.lists());

    let memory = self_memory().unwrap();
    let view = ContractReader::new()
        .read(&memory, header_address())
        .unwrap()
        .unwrap();
    assert_eq!(view.header_address, header_address());
    assert_eq!(view.encoding, TargetEncoding::host());
    assert_eq!(view.global("g_gcHeap"), Some(0x00AB_0000));
    assert!(view.size_of("Object").is_some());

    // Publishing is once per process
    assert!(matches!(
        populate_debug_headers(&runtime_globals(), &[]),
        Err(PublishError::AlreadyPublished)
    ));
}
