//! Release gating: manifests on disk, and what a published contract promises.

use rtdbg::versioning::ManifestField;
use rtdbg::{
    check_version_bump, diff_manifests, Bump, Change, ContractVersion, FieldKind,
    LayoutManifest, PolicyViolation, TargetEncoding,
};
use tempfile::tempdir;

use crate::common::*;

#[test]
fn test_published_contract_matches_manifest() {
    for enc in TargetEncoding::ALL {
        let view = read_back(&table_registry(enc, &runtime_globals()), enc);
        let published = LayoutManifest::from_view(&view);
        let promised = LayoutManifest::for_target(enc);
        let changes = diff_manifests(&promised, &published);
        assert!(changes.is_empty(), "{}: {:?}", enc, changes);
    }
}

#[test]
fn test_unpublished_global_shows_as_removal() {
    let view = read_back(&table_registry(LE64, &Default::default()), LE64);
    let changes = diff_manifests(
        &LayoutManifest::for_target(LE64),
        &LayoutManifest::from_view(&view),
    );
    assert!(changes
        .iter()
        .all(|c| matches!(c, Change::GlobalRemoved { .. })));
    assert_eq!(changes.len(), rtdbg::registry::CONTRACT_GLOBALS.len());
}

#[test]
fn test_manifest_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.json");
    let manifest = LayoutManifest::for_target(BE32);
    manifest.save(&path).unwrap();
    assert_eq!(LayoutManifest::load(&path).unwrap(), manifest);
}

#[test]
fn test_load_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = LayoutManifest::load(&path).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn test_new_type_needs_minor_bump() {
    let old = LayoutManifest::for_target(LE64);
    let mut new = old.clone();
    new.fields.push(ManifestField {
        type_name: "Thread".into(),
        field_name: "m_ThreadId".into(),
        offset: 8,
        kind: Some(FieldKind::U32),
    });

    let changes = diff_manifests(&old, &new);
    assert_eq!(
        check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(1, 1), &changes),
        Ok(Bump::Minor)
    );
    assert!(matches!(
        check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(1, 0), &changes),
        Err(PolicyViolation::InsufficientBump {
            required: Bump::Minor,
            ..
        })
    ));
}

#[test]
fn test_moved_field_needs_major_bump() {
    let old = LayoutManifest::for_target(LE64);
    let mut new = old.clone();
    let field = new
        .fields
        .iter_mut()
        .find(|f| f.field_name != "SIZEOF")
        .unwrap();
    field.offset += 4;

    let changes = diff_manifests(&old, &new);
    assert!(matches!(changes[0], Change::FieldMoved { .. }));
    assert!(
        check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(1, 9), &changes)
            .is_err()
    );
    assert_eq!(
        check_version_bump(ContractVersion::new(1, 3), ContractVersion::new(2, 0), &changes),
        Ok(Bump::Major)
    );
}

#[test]
fn test_saved_manifests_diff_like_in_memory() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old.json");
    let new_path = dir.path().join("new.json");

    let old = LayoutManifest::for_target(LE32);
    let mut new = old.clone();
    new.globals.remove("g_stressLog");
    new.version = ContractVersion::new(2, 0);
    old.save(&old_path).unwrap();
    new.save(&new_path).unwrap();

    let old = LayoutManifest::load(&old_path).unwrap();
    let new = LayoutManifest::load(&new_path).unwrap();
    let changes = diff_manifests(&old, &new);
    assert_eq!(
        changes,
        vec![Change::GlobalRemoved {
            name: "g_stressLog".into()
        }]
    );
    assert_eq!(check_version_bump(old.version, new.version, &changes), Ok(Bump::Major));
}

#[test]
fn test_version_going_backwards_rejected() {
    assert_eq!(
        check_version_bump(ContractVersion::new(2, 0), ContractVersion::new(1, 5), &[]),
        Err(PolicyViolation::VersionWentBackwards {
            old: ContractVersion::new(2, 0),
            new: ContractVersion::new(1, 5),
        })
    );
}
