//! Property-based tests for the configuration merge policy
//!
//! The merge fold has to behave like a join on a lattice: order of clients
//! must not matter, merging a request with itself must change nothing, and
//! the result may only widen, never narrow, what any participant asked for.

use aware_core::ConfigRequest;
use proptest::prelude::*;

fn arb_config_request() -> impl Strategy<Value = ConfigRequest> {
    (
        0u32..=255,
        0u32..=0xFFFF,
        0u32..=0xFFFF,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(master, a, b, support_5g, identity)| ConfigRequest {
            master_preference: master,
            cluster_low: a.min(b),
            cluster_high: a.max(b),
            support_5g,
            enable_identity_change_callback: identity,
        })
}

proptest! {
    /// Property: merge is commutative
    #[test]
    fn merge_commutes(a in arb_config_request(), b in arb_config_request()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    /// Property: merge is associative, so the fold order over clients is
    /// irrelevant
    #[test]
    fn merge_is_associative(
        a in arb_config_request(),
        b in arb_config_request(),
        c in arb_config_request(),
    ) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    /// Property: merge is idempotent
    #[test]
    fn merge_is_idempotent(a in arb_config_request()) {
        prop_assert_eq!(a.merge(&a), a);
    }

    /// Property: the merged result covers both inputs
    #[test]
    fn merge_only_widens(a in arb_config_request(), b in arb_config_request()) {
        let merged = a.merge(&b);
        for input in [&a, &b] {
            prop_assert!(merged.master_preference >= input.master_preference);
            prop_assert!(merged.cluster_low <= input.cluster_low);
            prop_assert!(merged.cluster_high >= input.cluster_high);
            prop_assert!(merged.support_5g || !input.support_5g);
            prop_assert!(
                merged.enable_identity_change_callback
                    || !input.enable_identity_change_callback
            );
        }
        prop_assert!(merged.is_valid());
    }

    /// Property: a request equal to the active config is always accepted,
    /// and acceptance never changes the on-air parameters of the merge
    #[test]
    fn compatible_requests_do_not_move_the_cluster(
        active in arb_config_request(),
        joining in arb_config_request(),
    ) {
        prop_assert!(active.compatible_with(&active));

        if joining.compatible_with(&active) {
            let merged = active.merge(&joining);
            prop_assert_eq!(merged.master_preference, active.master_preference);
            prop_assert_eq!(merged.cluster_low, active.cluster_low);
            prop_assert_eq!(merged.cluster_high, active.cluster_high);
        }
    }
}
