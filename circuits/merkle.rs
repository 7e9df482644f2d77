//! Sparse Merkle tree over Poseidon2
//!
//! Off-trace helper that produces the sibling paths the trace builder
//! checks. Nodes are combined with `poseidon2::compress(left, right)`, the
//! same ordering the builder uses, so a path taken from here authenticates
//! its leaf with `check_membership`.

use std::collections::HashMap;

use crate::m31::M31;
use crate::poseidon2::compress;
use crate::{Result, TraceError};

/// Default tree depth (2^20 leaves)
pub const DEFAULT_DEPTH: usize = 20;

/// Deepest tree whose leaf indices fit a `u32`
pub const MAX_TREE_DEPTH: usize = 31;

/// Default (empty) leaf value
pub fn empty_leaf() -> M31 {
    M31::ZERO
}

/// `roots[i]` is the root of an empty subtree of height `i`
pub fn empty_subtree_roots(depth: usize) -> Vec<M31> {
    let mut roots = Vec::with_capacity(depth + 1);
    roots.push(empty_leaf());
    for i in 1..=depth {
        roots.push(compress(roots[i - 1], roots[i - 1]));
    }
    roots
}

/// Fold `path` over `leaf` the way the trace builder does
pub fn compute_root(leaf: M31, leaf_index: u32, path: &[M31]) -> M31 {
    let mut current = leaf;
    let mut index = leaf_index;
    for &sibling in path {
        current = if index % 2 == 0 {
            compress(current, sibling)
        } else {
            compress(sibling, current)
        };
        index >>= 1;
    }
    current
}

/// In-memory Merkle tree storing only non-empty leaves
#[derive(Clone, Debug)]
pub struct MerkleTree {
    depth: usize,
    leaves: HashMap<u32, M31>,
    leaf_count: u32,
    empty_roots: Vec<M31>,
}

impl MerkleTree {
    /// Create an empty tree of the given depth (at most `MAX_TREE_DEPTH` levels)
    pub fn new(depth: usize) -> Result<Self> {
        if depth > MAX_TREE_DEPTH {
            return Err(TraceError::TreeTooDeep { depth });
        }
        Ok(Self {
            depth,
            leaves: HashMap::new(),
            leaf_count: 0,
            empty_roots: empty_subtree_roots(depth),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    /// Number of leaf slots, `2^depth`
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Append a leaf at the next free position and return its index
    pub fn insert(&mut self, leaf: M31) -> Result<u32> {
        let capacity = self.capacity();
        if u64::from(self.leaf_count) >= capacity {
            return Err(TraceError::TreeFull { capacity });
        }
        let index = self.leaf_count;
        self.leaves.insert(index, leaf);
        self.leaf_count += 1;
        Ok(index)
    }

    pub fn get_leaf(&self, index: u32) -> M31 {
        self.leaves.get(&index).copied().unwrap_or_else(empty_leaf)
    }

    pub fn root(&self) -> M31 {
        self.subtree_root(0, self.depth)
    }

    /// Root of the subtree of height `height` whose leftmost leaf is `start`
    fn subtree_root(&self, start: u32, height: usize) -> M31 {
        if height == 0 {
            return self.get_leaf(start);
        }
        if start >= self.leaf_count {
            return self.empty_roots[height];
        }

        let half = 1u32 << (height - 1);
        let left = self.subtree_root(start, height - 1);
        let right = self.subtree_root(start + half, height - 1);
        compress(left, right)
    }

    /// Sibling hashes from the leaf at `index` up to the root
    pub fn get_path(&self, index: u32) -> Vec<M31> {
        let mut current = index;
        (0..self.depth)
            .map(|level| {
                let sibling = current ^ 1;
                current >>= 1;
                self.subtree_root(sibling << level, level)
            })
            .collect()
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            leaves: HashMap::new(),
            leaf_count: 0,
            empty_roots: empty_subtree_roots(DEFAULT_DEPTH),
        }
    }
}
