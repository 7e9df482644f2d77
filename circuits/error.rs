//! Errors raised while recording or finalizing gadget traces, or while
//! building the off-trace Merkle tree
//!
//! A failed membership check is not an error: it is recorded as
//! `is_member = false`. Everything here is a caller contract violation.

use thiserror::Error;

use crate::config::{MAX_CLK, MAX_LEVELS_PER_CLK};
use crate::merkle::MAX_TREE_DEPTH;

pub type Result<T> = core::result::Result<T, TraceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("merkle path at clk {clk} has {len} levels, at most {} fit one clock", MAX_LEVELS_PER_CLK)]
    PathTooLong { clk: u32, len: usize },

    #[error("clk {clk} exceeds {}, domain tags would leave the field", MAX_CLK)]
    ClockOutOfRange { clk: u32 },

    #[error("leaf index {leaf_index} is not a canonical M31 value")]
    LeafIndexOutOfField { leaf_index: u32 },

    #[error("domain tag {tag} is not a canonical M31 value")]
    DomainTagOutOfField { tag: u32 },

    #[error("main trace exhausted: {needed} rows needed from row {offset}, {available} available")]
    TraceExhausted {
        needed: usize,
        available: usize,
        offset: usize,
    },

    #[error("{rows} rows do not fit a trace of 2^{log_n_rows} rows")]
    ExportTooLarge { rows: usize, log_n_rows: u32 },

    #[error("tree depth {depth} exceeds {}, leaf indices must fit u32", MAX_TREE_DEPTH)]
    TreeTooDeep { depth: usize },

    #[error("merkle tree is full ({capacity} leaves)")]
    TreeFull { capacity: u64 },
}
