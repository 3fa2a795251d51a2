//! Registry → image → reader agreement.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use rtdbg::{ContractReader, ImagePlan, Registry, TargetEncoding};

use crate::common::read_back;

// ============================================================================
// STRATEGIES
// ============================================================================

fn encoding_strategy() -> impl Strategy<Value = TargetEncoding> {
    prop::sample::select(TargetEncoding::ALL.to_vec())
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z_][A-Za-z0-9_]{0,30}").unwrap()
}

/// Distinct (type, field) pairs with offsets.
fn distinct_pairs_strategy() -> impl Strategy<Value = Vec<((String, String), u32)>> {
    prop::collection::hash_map((name_strategy(), name_strategy()), any::<u32>(), 0..80)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: N distinct pairs traverse to exactly N entries, no repeats.
    #[test]
    fn prop_distinct_pairs_traverse_once(enc in encoding_strategy(), pairs in distinct_pairs_strategy()) {
        let mut registry = Registry::new();
        for ((t, f), o) in &pairs {
            registry.register_field(t.clone(), f.clone(), *o);
        }
        let view = read_back(&registry, enc);

        prop_assert_eq!(view.types.len(), pairs.len());
        let addresses: HashSet<u64> = view.types.iter().map(|t| t.entry_address).collect();
        prop_assert_eq!(addresses.len(), pairs.len());
        for ((t, f), o) in &pairs {
            prop_assert_eq!(view.field(t, f), Some(*o));
        }
    }

    /// Property: lookup agrees between the registry and the decoded view.
    #[test]
    fn prop_view_agrees_with_registry(
        enc in encoding_strategy(),
        ops in prop::collection::vec((name_strategy(), name_strategy(), any::<u32>()), 0..60),
    ) {
        let mut registry = Registry::new();
        let mut expected = HashMap::new();
        for (t, f, o) in &ops {
            registry.register_field(t.clone(), f.clone(), *o);
            expected.insert((t.clone(), f.clone()), *o);
        }
        let view = read_back(&registry, enc);
        for ((t, f), o) in &expected {
            prop_assert_eq!(registry.field(t, f), Some(*o));
            prop_assert_eq!(view.field(t, f), Some(*o));
        }
    }

    /// Property: the image size is what the plan promised, wherever it is placed.
    #[test]
    fn prop_image_size_matches_plan(
        enc in encoding_strategy(),
        base in 0x1000u64..0x1000_0000,
        pairs in distinct_pairs_strategy(),
    ) {
        let mut registry = Registry::new();
        for ((t, f), o) in &pairs {
            registry.register_field(t.clone(), f.clone(), *o);
        }
        let plan = ImagePlan::new(&registry, enc, true);
        let (image, lists) = plan.encode(base).unwrap();
        prop_assert_eq!(image.len(), plan.total_size());
        prop_assert_eq!(lists.debug_types_list == 0, pairs.is_empty());

        let view = ContractReader::new().read(&image, base).unwrap().unwrap();
        prop_assert_eq!(view.header_address, base);
        prop_assert_eq!(view.encoding, enc);
    }
}
