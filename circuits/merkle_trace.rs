//! Merkle membership trace builder
//!
//! `check_membership` walks a sibling path from leaf to root, hashing through
//! the hashing gadget, and records the whole walk as one `MerkleCheckEntry`.
//! `finalize` later expands every entry into one main-trace row per path
//! level, filling the witness columns the membership relations are stated
//! over:
//!
//! - `path_len` counts down the levels left to the root and
//!   `path_len * path_len_inv` is 1 on every row but the last
//! - `diff_inv` inverts `output_hash - root` (0 when they are equal)
//! - `latch` and `is_member` are only set on the last row of an entry
//!
//! An entry with an empty path produces no rows: its verdict is returned to
//! the VM but there is no hash to prove.

use crate::config::{domain_tag, MAX_CLK, MAX_LEVELS_PER_CLK};
use crate::hash::{HashCaller, HashGadget};
use crate::m31::{M31, M31_PRIME};
use crate::poseidon2::Poseidon2TraceBuilder;
use crate::trace::{reserve_rows, MainTraceRow};
use crate::{Result, TraceError};

/// One recorded membership check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleCheckEntry {
    pub clk: u32,
    pub leaf_value: M31,
    pub leaf_index: u32,
    /// Sibling hashes, leaf level first
    pub path: Vec<M31>,
    /// Running hash after each level; the last one is the computed root
    pub path_values: Vec<M31>,
    pub root: M31,
    pub is_member: bool,
}

impl MerkleCheckEntry {
    /// Number of trace rows this entry expands to
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Root reached by the walk (the leaf itself for an empty path)
    pub fn computed_root(&self) -> M31 {
        self.path_values.last().copied().unwrap_or(self.leaf_value)
    }
}

/// Records Merkle membership checks and expands them into trace rows
#[derive(Clone, Debug, Default)]
pub struct MerkleTreeTraceBuilder<H = Poseidon2TraceBuilder> {
    hasher: H,
    entries: Vec<MerkleCheckEntry>,
    /// Entries already expanded by `finalize`
    finalized: usize,
    start_row: usize,
    cursor: usize,
}

impl MerkleTreeTraceBuilder<Poseidon2TraceBuilder> {
    pub fn new() -> Self {
        Self::with_hasher(Poseidon2TraceBuilder::new())
    }
}

impl<H: HashGadget> MerkleTreeTraceBuilder<H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            hasher,
            entries: Vec::new(),
            finalized: 0,
            start_row: 0,
            cursor: 0,
        }
    }

    /// Write rows starting at `row` of the main trace instead of row 0
    pub fn with_start_row(mut self, row: usize) -> Self {
        self.start_row = row;
        self.cursor = row;
        self
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn hasher_mut(&mut self) -> &mut H {
        &mut self.hasher
    }

    pub fn entries(&self) -> &[MerkleCheckEntry] {
        &self.entries
    }

    /// Next main-trace row `finalize` will write
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows the next `finalize` call will write
    pub fn pending_rows(&self) -> usize {
        self.entries[self.finalized..].iter().map(MerkleCheckEntry::depth).sum()
    }

    /// Check that `path` authenticates `leaf_value` at `leaf_index` against `root`.
    ///
    /// A failed check is recorded and returned as `Ok(false)`. Errors are
    /// reserved for inputs the trace cannot represent; in that case nothing
    /// is recorded and the hashing gadget is not called.
    pub fn check_membership(
        &mut self,
        clk: u32,
        leaf_value: M31,
        leaf_index: u32,
        path: &[M31],
        root: M31,
    ) -> Result<bool> {
        if path.len() > MAX_LEVELS_PER_CLK {
            return Err(TraceError::PathTooLong {
                clk,
                len: path.len(),
            });
        }
        if clk > MAX_CLK {
            return Err(TraceError::ClockOutOfRange { clk });
        }
        if leaf_index >= M31_PRIME {
            return Err(TraceError::LeafIndexOutOfField { leaf_index });
        }

        let mut current_value = leaf_value;
        let mut current_index = leaf_index;
        let mut path_values = Vec::with_capacity(path.len());

        for (level, &sibling) in (0u32..).zip(path) {
            let (left, right) = if current_index % 2 == 0 {
                (current_value, sibling)
            } else {
                (sibling, current_value)
            };
            current_value =
                self.hasher
                    .compress(left, right, domain_tag(clk, level), HashCaller::MerkleTree);
            path_values.push(current_value);
            current_index >>= 1;
        }

        let is_member = current_value == root;
        tracing::debug!(clk, leaf_index, depth = path.len(), is_member, "merkle membership checked");

        self.entries.push(MerkleCheckEntry {
            clk,
            leaf_value,
            leaf_index,
            path: path.to_vec(),
            path_values,
            root,
            is_member,
        });
        Ok(is_member)
    }

    /// Expand every entry recorded since the last `finalize` into `main_trace`.
    ///
    /// Rows are written consecutively from the cursor, which then moves past
    /// them. If the trace cannot hold every pending row nothing is written.
    pub fn finalize(&mut self, main_trace: &mut [MainTraceRow]) -> Result<()> {
        let needed = self.pending_rows();
        let rows = reserve_rows(main_trace, self.cursor, needed)?;
        let mut counter = 0;

        for src in &self.entries[self.finalized..] {
            let path_length = src.path.len();
            let mut curr_value = src.leaf_value;
            let mut leaf_index = src.leaf_index;

            for (level, (&sibling, &output)) in src.path.iter().zip(&src.path_values).enumerate() {
                let dest = &mut rows[counter];
                counter += 1;
                let is_even = leaf_index % 2 == 0;
                let remaining = path_length - level - 1;
                let diff = output - src.root;

                dest.merkle_tree_clk = M31::from(domain_tag(src.clk, level as u32));
                dest.merkle_tree_leaf_index = M31::from(leaf_index);
                dest.merkle_tree_leaf_value = curr_value;
                dest.merkle_tree_expected_tree_root = src.root;

                dest.merkle_tree_leaf_index_is_even = M31::from(is_even);
                dest.merkle_tree_left_hash = if is_even { curr_value } else { sibling };
                dest.merkle_tree_right_hash = if is_even { sibling } else { curr_value };
                dest.merkle_tree_output_hash = output;
                dest.merkle_tree_sibling_value = sibling;

                dest.merkle_tree_path_len = M31::from(remaining as u32);
                dest.merkle_tree_path_len_inv = M31::from(remaining as u32).inverse_or_zero();
                dest.merkle_tree_sel_merkle_tree = M31::ONE;
                dest.merkle_tree_diff_inv = diff.inverse_or_zero();

                if remaining == 0 {
                    dest.merkle_tree_latch = M31::ONE;
                    dest.merkle_tree_is_member = M31::from(src.is_member);
                }

                curr_value = output;
                leaf_index >>= 1;
            }
        }

        tracing::debug!(
            entries = self.entries.len() - self.finalized,
            rows = needed,
            start = self.cursor,
            "merkle tree trace finalized"
        );
        self.cursor += needed;
        self.finalized = self.entries.len();
        Ok(())
    }

    /// Drop all entries, rewind the cursor and reset the hashing gadget
    pub fn reset(&mut self) {
        self.entries.clear();
        self.finalized = 0;
        self.cursor = self.start_row;
        self.hasher.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::empty_trace;

    /// Transparent linear "hash" so expected values can be written by hand
    #[derive(Default)]
    struct LinearHasher {
        calls: Vec<(M31, M31, u32)>,
    }

    impl LinearHasher {
        fn h(left: M31, right: M31) -> M31 {
            left * M31::new(3) + right * M31::new(7) + M31::ONE
        }
    }

    impl HashGadget for LinearHasher {
        fn compress(&mut self, left: M31, right: M31, domain_tag: u32, _caller: HashCaller) -> M31 {
            self.calls.push((left, right, domain_tag));
            Self::h(left, right)
        }

        fn reset(&mut self) {
            self.calls.clear();
        }
    }

    fn m(v: u32) -> M31 {
        M31::new(v)
    }

    #[test]
    fn test_index_five_worked_example() {
        // 5 = 0b101: right child, then left child, then right child
        let (leaf, s0, s1, s2) = (m(10), m(20), m(30), m(40));
        let h = LinearHasher::h;
        let v0 = h(s0, leaf);
        let v1 = h(v0, s1);
        let v2 = h(s2, v1);

        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        assert!(builder.check_membership(1, leaf, 5, &[s0, s1, s2], v2).unwrap());

        assert_eq!(
            builder.hasher().calls,
            vec![(s0, leaf, 32), (v0, s1, 33), (s2, v1, 34)]
        );
        assert_eq!(builder.entries()[0].path_values, vec![v0, v1, v2]);

        let mut trace = empty_trace(3);
        builder.finalize(&mut trace).unwrap();

        let expected = [
            // (index, is_even, value, left, right, output)
            (5, 0, leaf, s0, leaf, v0),
            (2, 1, v0, v0, s1, v1),
            (1, 0, v1, s2, v1, v2),
        ];
        for (row, (index, even, value, left, right, out)) in trace.iter().zip(expected) {
            assert_eq!(row.merkle_tree_leaf_index, m(index));
            assert_eq!(row.merkle_tree_leaf_index_is_even, m(even));
            assert_eq!(row.merkle_tree_leaf_value, value);
            assert_eq!(row.merkle_tree_left_hash, left);
            assert_eq!(row.merkle_tree_right_hash, right);
            assert_eq!(row.merkle_tree_output_hash, out);
        }
        assert_eq!(trace[0].merkle_tree_sibling_value, s0);
        assert_eq!(trace[2].merkle_tree_sibling_value, s2);
    }

    #[test]
    fn test_countdown_and_latch() {
        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        builder.check_membership(2, m(1), 0, &[m(2), m(3), m(4), m(5)], m(0)).unwrap();

        let mut trace = empty_trace(4);
        builder.finalize(&mut trace).unwrap();

        for (i, row) in trace.iter().enumerate() {
            let countdown = m(3 - i as u32);
            assert_eq!(row.merkle_tree_clk, m(64 + i as u32));
            assert_eq!(row.merkle_tree_path_len, countdown);
            assert_eq!(row.merkle_tree_sel_merkle_tree, M31::ONE);
            if i < 3 {
                assert_eq!(row.merkle_tree_path_len * row.merkle_tree_path_len_inv, M31::ONE);
                assert!(row.merkle_tree_latch.is_zero());
                assert!(row.merkle_tree_is_member.is_zero());
            } else {
                assert!(row.merkle_tree_path_len_inv.is_zero());
                assert_eq!(row.merkle_tree_latch, M31::ONE);
            }
        }
    }

    #[test]
    fn test_diff_inverse_witness() {
        let leaf = m(9);
        let sibling = m(11);
        let root = LinearHasher::h(leaf, sibling);

        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        assert!(builder.check_membership(0, leaf, 0, &[sibling], root).unwrap());
        assert!(!builder.check_membership(1, leaf, 0, &[sibling], root + M31::ONE).unwrap());

        let mut trace = empty_trace(2);
        builder.finalize(&mut trace).unwrap();

        assert!(trace[0].merkle_tree_diff_inv.is_zero());
        assert_eq!(trace[0].merkle_tree_is_member, M31::ONE);

        let diff = trace[1].merkle_tree_output_hash - trace[1].merkle_tree_expected_tree_root;
        assert_eq!(diff, -M31::ONE);
        assert_eq!(diff * trace[1].merkle_tree_diff_inv, M31::ONE);
        assert_eq!(trace[1].merkle_tree_latch, M31::ONE);
        assert!(trace[1].merkle_tree_is_member.is_zero());
    }

    #[test]
    fn test_empty_path_emits_no_rows() {
        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        assert!(builder.check_membership(4, m(77), 0, &[], m(77)).unwrap());
        assert!(!builder.check_membership(5, m(77), 0, &[], m(78)).unwrap());
        assert!(builder.hasher().calls.is_empty());

        let entry = &builder.entries()[0];
        assert!(entry.path_values.is_empty());
        assert_eq!(entry.computed_root(), m(77));

        let mut trace: Vec<MainTraceRow> = Vec::new();
        builder.finalize(&mut trace).unwrap();
        assert_eq!(builder.cursor(), 0);
    }

    #[test]
    fn test_path_too_long_is_rejected() {
        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        let path = vec![M31::ZERO; MAX_LEVELS_PER_CLK + 1];

        assert_eq!(
            builder.check_membership(3, m(1), 0, &path, m(0)),
            Err(TraceError::PathTooLong { clk: 3, len: 33 })
        );
        assert!(builder.entries().is_empty());
        assert!(builder.hasher().calls.is_empty());

        assert!(builder
            .check_membership(3, m(1), 0, &path[..MAX_LEVELS_PER_CLK], m(0))
            .is_ok());
    }

    #[test]
    fn test_out_of_range_inputs_are_rejected() {
        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        assert_eq!(
            builder.check_membership(MAX_CLK + 1, m(1), 0, &[m(2)], m(0)),
            Err(TraceError::ClockOutOfRange { clk: MAX_CLK + 1 })
        );
        assert_eq!(
            builder.check_membership(0, m(1), M31_PRIME, &[m(2)], m(0)),
            Err(TraceError::LeafIndexOutOfField { leaf_index: M31_PRIME })
        );
        assert!(builder.check_membership(MAX_CLK, m(1), M31_PRIME - 1, &[m(2)], m(0)).is_ok());
        assert!(builder.hasher().calls.len() == 1);
    }

    #[test]
    fn test_finalize_exhausted_trace_writes_nothing() {
        let mut builder = MerkleTreeTraceBuilder::with_hasher(LinearHasher::default());
        builder.check_membership(0, m(1), 0, &[m(2), m(3)], m(0)).unwrap();
        builder.check_membership(1, m(1), 1, &[m(2), m(3)], m(0)).unwrap();

        let mut trace = empty_trace(3);
        assert_eq!(
            builder.finalize(&mut trace),
            Err(TraceError::TraceExhausted { needed: 4, available: 3, offset: 0 })
        );
        assert!(trace.iter().all(|row| *row == MainTraceRow::default()));
        assert_eq!(builder.cursor(), 0);
        assert_eq!(builder.pending_rows(), 4);
    }

    #[test]
    fn test_cursor_advances_across_finalize_calls() {
        let mut builder =
            MerkleTreeTraceBuilder::with_hasher(LinearHasher::default()).with_start_row(1);
        builder.check_membership(0, m(1), 0, &[m(2), m(3)], m(0)).unwrap();

        let mut trace = empty_trace(6);
        builder.finalize(&mut trace).unwrap();
        assert_eq!(builder.cursor(), 3);

        builder.check_membership(1, m(4), 3, &[m(5)], m(0)).unwrap();
        assert_eq!(builder.pending_rows(), 1);
        builder.finalize(&mut trace).unwrap();
        assert_eq!(builder.cursor(), 4);

        assert!(trace[0].merkle_tree_sel_merkle_tree.is_zero());
        assert_eq!(trace[1].merkle_tree_clk, m(0));
        assert_eq!(trace[3].merkle_tree_clk, m(32));
        assert_eq!(trace[3].merkle_tree_leaf_value, m(4));
        assert!(trace[4].merkle_tree_sel_merkle_tree.is_zero());
    }

    #[test]
    fn test_reset_returns_to_empty_state() {
        let mut builder =
            MerkleTreeTraceBuilder::with_hasher(LinearHasher::default()).with_start_row(2);
        builder.check_membership(0, m(1), 0, &[m(2)], m(0)).unwrap();
        let mut trace = empty_trace(4);
        builder.finalize(&mut trace).unwrap();

        builder.reset();
        assert!(builder.entries().is_empty());
        assert!(builder.hasher().calls.is_empty());
        assert_eq!(builder.cursor(), 2);
        assert_eq!(builder.pending_rows(), 0);
    }

    #[test]
    fn test_reset_rewinds_both_gadgets_to_their_start_rows() {
        let hasher = Poseidon2TraceBuilder::new().with_start_row(8);
        let mut builder = MerkleTreeTraceBuilder::with_hasher(hasher).with_start_row(2);
        builder.check_membership(0, m(1), 0, &[m(2)], m(0)).unwrap();
        let mut trace = empty_trace(10);
        builder.finalize(&mut trace).unwrap();
        builder.hasher_mut().finalize(&mut trace).unwrap();

        builder.reset();
        assert_eq!(builder.cursor(), 2);
        assert_eq!(builder.hasher().cursor(), 8);

        builder.check_membership(0, m(1), 0, &[m(2)], m(0)).unwrap();
        let mut next = empty_trace(10);
        builder.finalize(&mut next).unwrap();
        builder.hasher_mut().finalize(&mut next).unwrap();
        assert_eq!(next, trace);
        assert!(next[0].poseidon2_sel.is_zero());
    }

    #[test]
    fn test_start_row_past_end_is_an_error_even_with_no_rows() {
        let mut builder =
            MerkleTreeTraceBuilder::with_hasher(LinearHasher::default()).with_start_row(10);
        assert!(builder.check_membership(0, m(3), 0, &[], m(3)).unwrap());

        let mut trace = empty_trace(4);
        assert_eq!(
            builder.finalize(&mut trace),
            Err(TraceError::TraceExhausted { needed: 0, available: 0, offset: 10 })
        );
        assert_eq!(builder.cursor(), 10);
        assert_eq!(builder.entries().len(), 1);
    }
}
