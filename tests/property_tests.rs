//! Property tests over random paths and leaf indices

use proptest::prelude::*;

use merkle_trace::merkle::compute_root;
use merkle_trace::relations::check_merkle_rows;
use merkle_trace::trace::empty_trace;
use merkle_trace::{MerkleTreeTraceBuilder, M31, M31_PRIME};

fn field_element() -> impl Strategy<Value = M31> {
    (0..M31_PRIME).prop_map(M31::new)
}

fn path(max_depth: usize) -> impl Strategy<Value = Vec<M31>> {
    prop::collection::vec(field_element(), 1..=max_depth)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn verdict_matches_fold(
        leaf in field_element(),
        index in 0..M31_PRIME,
        siblings in path(12),
        honest in any::<bool>(),
        other_root in field_element(),
    ) {
        let folded = compute_root(leaf, index, &siblings);
        let root = if honest { folded } else { other_root };

        let mut builder = MerkleTreeTraceBuilder::new();
        let verdict = builder.check_membership(1, leaf, index, &siblings, root).unwrap();

        prop_assert_eq!(verdict, folded == root);
        let entry = &builder.entries()[0];
        prop_assert_eq!(entry.path_values.len(), siblings.len());
        prop_assert_eq!(*entry.path_values.last().unwrap() == root, verdict);
    }

    #[test]
    fn rows_follow_witness_rules(
        leaf in field_element(),
        index in 0..M31_PRIME,
        siblings in path(10),
        honest in any::<bool>(),
    ) {
        let root = if honest { compute_root(leaf, index, &siblings) } else { leaf };
        let depth = siblings.len();

        let mut builder = MerkleTreeTraceBuilder::new();
        let verdict = builder.check_membership(2, leaf, index, &siblings, root).unwrap();
        let mut trace = empty_trace(depth);
        builder.finalize(&mut trace).unwrap();

        let mut value = leaf;
        let mut current_index = index;
        for (i, row) in trace.iter().enumerate() {
            let countdown = row.merkle_tree_path_len;
            let diff = row.merkle_tree_output_hash - row.merkle_tree_expected_tree_root;
            let last = i == depth - 1;

            prop_assert_eq!(countdown, M31::new((depth - i - 1) as u32));
            prop_assert_eq!(countdown * row.merkle_tree_path_len_inv, M31::from(!last));
            prop_assert_eq!(diff * row.merkle_tree_diff_inv, M31::from(!diff.is_zero()));
            if diff.is_zero() {
                prop_assert!(row.merkle_tree_diff_inv.is_zero());
            }
            prop_assert_eq!(row.merkle_tree_latch, M31::from(last));
            prop_assert_eq!(row.merkle_tree_is_member, M31::from(last && verdict));

            let sibling = siblings[i];
            let (left, right) = if current_index % 2 == 0 { (value, sibling) } else { (sibling, value) };
            prop_assert_eq!(row.merkle_tree_leaf_index, M31::new(current_index));
            prop_assert_eq!(row.merkle_tree_left_hash, left);
            prop_assert_eq!(row.merkle_tree_right_hash, right);

            value = row.merkle_tree_output_hash;
            current_index >>= 1;
        }

        prop_assert!(check_merkle_rows(&trace).is_ok());
    }
}
