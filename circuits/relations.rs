//! Native evaluation of the Merkle gadget relations
//!
//! Debugging aid for trace generation: evaluates, row by row, the identities
//! the Merkle columns have to satisfy and reports every row where one is
//! non-zero. An honest `finalize` output passes; a trace with a flipped cell
//! is caught here long before a prover run fails.

use itertools::Itertools;

use crate::hash::HashCaller;
use crate::m31::M31;
use crate::poseidon2::Poseidon2TraceEntry;
use crate::trace::MainTraceRow;

/// A relation that evaluated to a non-zero value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationFailure {
    pub row: usize,
    pub relation: &'static str,
}

fn boolean(x: M31) -> M31 {
    x * (M31::ONE - x)
}

/// Relations involving a single row
pub fn evaluate_row(row: &MainTraceRow) -> Vec<(&'static str, M31)> {
    let sel = row.merkle_tree_sel_merkle_tree;
    let even = row.merkle_tree_leaf_index_is_even;
    let latch = row.merkle_tree_latch;
    let path_len = row.merkle_tree_path_len;
    let diff = row.merkle_tree_output_hash - row.merkle_tree_expected_tree_root;
    let diff_inv = row.merkle_tree_diff_inv;
    let is_member = row.merkle_tree_is_member;
    let value = row.merkle_tree_leaf_value;
    let sibling = row.merkle_tree_sibling_value;

    let not_equal = diff * diff_inv;

    vec![
        ("sel_boolean", boolean(sel)),
        ("is_even_boolean", sel * boolean(even)),
        ("latch_boolean", boolean(latch)),
        ("is_member_boolean", boolean(is_member)),
        ("latch_only_when_active", (M31::ONE - sel) * latch),
        (
            "path_len_zero_check",
            sel * (path_len * row.merkle_tree_path_len_inv - (M31::ONE - latch)),
        ),
        ("latch_path_len_zero", latch * path_len),
        ("diff_inv_witness", sel * diff * (M31::ONE - not_equal)),
        ("diff_inv_zero_when_equal", sel * diff_inv * (M31::ONE - not_equal)),
        ("is_member_on_latch", latch * (is_member - (M31::ONE - not_equal))),
        ("is_member_only_on_latch", (M31::ONE - latch) * is_member),
        (
            "left_hash_select",
            sel * (row.merkle_tree_left_hash - (even * value + (M31::ONE - even) * sibling)),
        ),
        (
            "right_hash_select",
            sel * (row.merkle_tree_right_hash - (even * sibling + (M31::ONE - even) * value)),
        ),
    ]
}

/// Relations between a row and the one after it, active while the path continues
pub fn evaluate_transition(row: &MainTraceRow, next: &MainTraceRow) -> Vec<(&'static str, M31)> {
    let continues = row.merkle_tree_sel_merkle_tree * (M31::ONE - row.merkle_tree_latch);
    let parity = M31::ONE - row.merkle_tree_leaf_index_is_even;

    vec![
        ("next_row_active", continues * (next.merkle_tree_sel_merkle_tree - M31::ONE)),
        (
            "running_value",
            continues * (next.merkle_tree_leaf_value - row.merkle_tree_output_hash),
        ),
        (
            "clk_increment",
            continues * (next.merkle_tree_clk - row.merkle_tree_clk - M31::ONE),
        ),
        (
            "root_constant",
            continues * (next.merkle_tree_expected_tree_root - row.merkle_tree_expected_tree_root),
        ),
        (
            "path_len_decrement",
            continues * (row.merkle_tree_path_len - next.merkle_tree_path_len - M31::ONE),
        ),
        (
            "leaf_index_halving",
            continues
                * (row.merkle_tree_leaf_index
                    - (next.merkle_tree_leaf_index + next.merkle_tree_leaf_index + parity)),
        ),
    ]
}

/// Evaluate every Merkle relation over `rows` and collect the failures.
///
/// The last row of the slice has no successor, so an entry left open there
/// (active without a latch) is reported as `next_row_active`.
pub fn check_merkle_rows(rows: &[MainTraceRow]) -> Result<(), Vec<RelationFailure>> {
    let mut failures = Vec::new();
    let padding = MainTraceRow::default();

    for (i, row) in rows.iter().enumerate() {
        let next = rows.get(i + 1).unwrap_or(&padding);
        let evals = evaluate_row(row)
            .into_iter()
            .chain(evaluate_transition(row, next));
        for (relation, eval) in evals {
            if !eval.is_zero() {
                failures.push(RelationFailure { row: i, relation });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Check every active Merkle row against the hashing gadget's records.
///
/// Each row's `(clk, left, right, output)` must match a `MerkleTree`-tagged
/// Poseidon2 entry, which is where the hash itself gets proven.
pub fn check_hash_lookups(
    rows: &[MainTraceRow],
    hashes: &[Poseidon2TraceEntry],
) -> Result<(), Vec<RelationFailure>> {
    let table = hashes
        .iter()
        .filter(|e| e.caller == HashCaller::MerkleTree)
        .map(|e| (M31::from(e.clk), e.input[0], e.input[1], e.output))
        .collect_vec();

    let failures = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.merkle_tree_sel_merkle_tree == M31::ONE)
        .filter(|(_, row)| {
            let key = (
                row.merkle_tree_clk,
                row.merkle_tree_left_hash,
                row.merkle_tree_right_hash,
                row.merkle_tree_output_hash,
            );
            !table.contains(&key)
        })
        .map(|(row, _)| RelationFailure {
            row,
            relation: "poseidon2_lookup",
        })
        .collect_vec();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
