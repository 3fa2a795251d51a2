//! Versioning policy over generated manifests.

use proptest::prelude::*;
use rtdbg::versioning::ManifestField;
use rtdbg::{
    check_version_bump, diff_manifests, required_bump, Bump, ContractVersion, LayoutManifest,
    TargetEncoding,
};

fn encoding_strategy() -> impl Strategy<Value = TargetEncoding> {
    prop::sample::select(TargetEncoding::ALL.to_vec())
}

proptest! {
    /// Property: adding fields to a new type never needs more than a minor bump.
    #[test]
    fn prop_additions_are_minor(
        enc in encoding_strategy(),
        names in prop::collection::hash_set("[a-z]{1,12}", 1..10),
    ) {
        let old = LayoutManifest::for_target(enc);
        let mut new = old.clone();
        for (i, name) in names.iter().enumerate() {
            new.fields.push(ManifestField {
                type_name: "NewType".into(),
                field_name: name.clone(),
                offset: i as u32 * 4,
                kind: None,
            });
            new.globals.insert(format!("g_{}", name));
        }
        let changes = diff_manifests(&old, &new);
        prop_assert_eq!(required_bump(&changes), Bump::Minor);
        prop_assert!(check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(1, 1), &changes).is_ok());
    }

    /// Property: dropping any published field needs a major bump.
    #[test]
    fn prop_removal_is_major(enc in encoding_strategy(), index in any::<prop::sample::Index>()) {
        let old = LayoutManifest::for_target(enc);
        let mut new = old.clone();
        new.fields.remove(index.index(old.fields.len()));
        let changes = diff_manifests(&old, &new);
        prop_assert_eq!(required_bump(&changes), Bump::Major);
        prop_assert!(check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(1, 1), &changes).is_err());
        prop_assert!(check_version_bump(ContractVersion::new(1, 0), ContractVersion::new(2, 0), &changes).is_ok());
    }

    /// Property: moving any non-size field needs a major bump.
    #[test]
    fn prop_move_is_major(enc in encoding_strategy(), index in any::<prop::sample::Index>(), delta in 1u32..64) {
        let old = LayoutManifest::for_target(enc);
        let mut new = old.clone();
        let movable: Vec<usize> = (0..old.fields.len())
            .filter(|&i| old.fields[i].field_name != "SIZEOF")
            .collect();
        let at = movable[index.index(movable.len())];
        new.fields[at].offset += delta;
        prop_assert_eq!(required_bump(&diff_manifests(&old, &new)), Bump::Major);
    }
}
