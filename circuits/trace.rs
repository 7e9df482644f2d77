//! Main execution trace rows
//!
//! The VM's main trace is one wide row type; each gadget owns a disjoint
//! group of columns and writes its own rows into a pre-sized buffer handed
//! over as `&mut [MainTraceRow]`. Columns nobody writes stay zero.

use crate::m31::M31;

/// One row of the main trace (Merkle and Poseidon2 column groups)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MainTraceRow {
    // Merkle membership gadget
    pub merkle_tree_clk: M31,
    pub merkle_tree_leaf_index: M31,
    pub merkle_tree_leaf_value: M31,
    pub merkle_tree_left_hash: M31,
    pub merkle_tree_right_hash: M31,
    pub merkle_tree_sibling_value: M31,
    pub merkle_tree_output_hash: M31,
    pub merkle_tree_expected_tree_root: M31,
    pub merkle_tree_leaf_index_is_even: M31,
    pub merkle_tree_path_len: M31,
    pub merkle_tree_path_len_inv: M31,
    pub merkle_tree_diff_inv: M31,
    pub merkle_tree_sel_merkle_tree: M31,
    pub merkle_tree_latch: M31,
    pub merkle_tree_is_member: M31,

    // Poseidon2 hashing gadget
    pub poseidon2_clk: M31,
    pub poseidon2_a: M31,
    pub poseidon2_b: M31,
    pub poseidon2_output: M31,
    pub poseidon2_caller: M31,
    pub poseidon2_sel: M31,
}

/// Number of Merkle gadget columns
pub const N_MERKLE_COLUMNS: usize = 15;

/// Canonical names of the Merkle columns, in `merkle_columns()` order
pub const MERKLE_COLUMN_NAMES: [&str; N_MERKLE_COLUMNS] = [
    "merkle_tree_clk",
    "merkle_tree_leaf_index",
    "merkle_tree_leaf_value",
    "merkle_tree_left_hash",
    "merkle_tree_right_hash",
    "merkle_tree_sibling_value",
    "merkle_tree_output_hash",
    "merkle_tree_expected_tree_root",
    "merkle_tree_leaf_index_is_even",
    "merkle_tree_path_len",
    "merkle_tree_path_len_inv",
    "merkle_tree_diff_inv",
    "merkle_tree_sel_merkle_tree",
    "merkle_tree_latch",
    "merkle_tree_is_member",
];

impl MainTraceRow {
    /// Merkle columns of this row in canonical order
    pub fn merkle_columns(&self) -> [M31; N_MERKLE_COLUMNS] {
        [
            self.merkle_tree_clk,
            self.merkle_tree_leaf_index,
            self.merkle_tree_leaf_value,
            self.merkle_tree_left_hash,
            self.merkle_tree_right_hash,
            self.merkle_tree_sibling_value,
            self.merkle_tree_output_hash,
            self.merkle_tree_expected_tree_root,
            self.merkle_tree_leaf_index_is_even,
            self.merkle_tree_path_len,
            self.merkle_tree_path_len_inv,
            self.merkle_tree_diff_inv,
            self.merkle_tree_sel_merkle_tree,
            self.merkle_tree_latch,
            self.merkle_tree_is_member,
        ]
    }
}

/// Allocate an all-zero main trace of `n_rows` rows
pub fn empty_trace(n_rows: usize) -> Vec<MainTraceRow> {
    vec![MainTraceRow::default(); n_rows]
}

/// Reserve `needed` rows of `trace` starting at `offset`, or report how many are left.
pub(crate) fn reserve_rows(
    trace: &mut [MainTraceRow],
    offset: usize,
    needed: usize,
) -> crate::Result<&mut [MainTraceRow]> {
    let available = trace.len().saturating_sub(offset);
    let exhausted = crate::TraceError::TraceExhausted {
        needed,
        available,
        offset,
    };
    // An offset past the end fails even when nothing is pending
    let end = offset.checked_add(needed).ok_or_else(|| exhausted.clone())?;
    trace.get_mut(offset..end).ok_or(exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_row_is_zero() {
        let row = MainTraceRow::default();
        assert!(row.merkle_columns().iter().all(|c| c.is_zero()));
        assert!(row.poseidon2_sel.is_zero());
    }

    #[test]
    fn test_merkle_column_order() {
        let row = MainTraceRow {
            merkle_tree_clk: M31::new(1),
            merkle_tree_is_member: M31::new(15),
            ..Default::default()
        };
        let cols = row.merkle_columns();
        assert_eq!(cols[0], M31::new(1));
        assert_eq!(cols[N_MERKLE_COLUMNS - 1], M31::new(15));
        assert_eq!(MERKLE_COLUMN_NAMES[N_MERKLE_COLUMNS - 1], "merkle_tree_is_member");
    }

    #[test]
    fn test_reserve_rows() {
        let mut trace = empty_trace(4);
        assert_eq!(reserve_rows(&mut trace, 1, 3).unwrap().len(), 3);
        assert_eq!(
            reserve_rows(&mut trace, 2, 3).unwrap_err(),
            crate::TraceError::TraceExhausted { needed: 3, available: 2, offset: 2 }
        );
        assert!(reserve_rows(&mut trace, 9, 1).is_err());
        assert_eq!(reserve_rows(&mut trace, 4, 0).unwrap().len(), 0);
    }

    #[test]
    fn test_reserve_rows_past_end_with_nothing_needed() {
        let mut trace = empty_trace(4);
        assert_eq!(
            reserve_rows(&mut trace, 9, 0).unwrap_err(),
            crate::TraceError::TraceExhausted { needed: 0, available: 0, offset: 9 }
        );
        assert!(reserve_rows(&mut trace, usize::MAX, 2).is_err());
    }
}
