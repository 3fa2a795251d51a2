//! Snapshots saved to disk and read back by a debugger.

use std::fs;

use rtdbg::sample::{sample_snapshot, SampleHeap, SAMPLE_ARRAY_LENGTH};
use rtdbg::{ContractReader, ObjectReader, Snapshot, TargetEncoding, ThreadListReader};
use tempfile::tempdir;

const HEAP_BASE: u64 = 0x0040_0000;

#[test]
fn test_snapshot_file_roundtrip_every_target() {
    let dir = tempdir().unwrap();
    for enc in TargetEncoding::ALL {
        let path = dir.path().join(format!("{}.rtds", enc));
        let snapshot = sample_snapshot(enc, HEAP_BASE, None).unwrap();
        snapshot.write_to_file(&path).unwrap();

        let loaded = Snapshot::read_from_file(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.header_address(), snapshot.header_address());
    }
}

#[test]
fn test_debugger_reads_contract_and_objects_from_file() {
    let dir = tempdir().unwrap();
    for enc in TargetEncoding::ALL {
        let path = dir.path().join("dump.rtds");
        sample_snapshot(enc, HEAP_BASE, None)
            .unwrap()
            .write_to_file(&path)
            .unwrap();
        let heap = SampleHeap::build(enc, HEAP_BASE).unwrap();

        let snapshot = Snapshot::read_from_file(&path).unwrap();
        let view = ContractReader::new()
            .read(&snapshot, snapshot.header_address())
            .unwrap()
            .expect("contract present");
        assert_eq!(view.encoding, enc);
        assert_eq!(view.global("g_pTheRuntimeInstance"), Some(heap.runtime_instance));
        assert!(view.size_of("Thread").is_some());

        let objects = ObjectReader::new(&view).unwrap();
        let array = objects.read_object(&snapshot, heap.array_object).unwrap();
        assert_eq!(array.array_length, Some(SAMPLE_ARRAY_LENGTH));

        let free = objects.read_type(&snapshot, heap.free_object_type).unwrap();
        assert_eq!(free.component_size, 1);

        let threads = ThreadListReader::new(&view)
            .unwrap()
            .read_threads(&snapshot, heap.runtime_instance)
            .unwrap();
        assert_eq!(threads.len(), heap.threads.len());
        assert_eq!(threads[0].address, heap.threads[0]);
    }
}

#[test]
fn test_corrupted_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rtds");
    let snapshot = sample_snapshot(TargetEncoding::host(), HEAP_BASE, None).unwrap();
    snapshot.write_to_file(&path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = Snapshot::read_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("CRC32"), "{}", err);
}

#[test]
fn test_truncated_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rtds");
    sample_snapshot(TargetEncoding::host(), HEAP_BASE, None)
        .unwrap()
        .write_to_file(&path)
        .unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    assert!(Snapshot::read_from_file(&path).is_err());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = Snapshot::read_from_file(&dir.path().join("absent.rtds")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_budgeted_contract_still_reads() {
    let snapshot = sample_snapshot(TargetEncoding::host(), HEAP_BASE, Some(4)).unwrap();
    let view = ContractReader::new()
        .read(&snapshot, snapshot.header_address())
        .unwrap()
        .unwrap();
    assert!(view.types.len() + view.globals.len() <= 4);
}
