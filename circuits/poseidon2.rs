//! Poseidon2 over M31
//!
//! A width-3 Poseidon2 permutation used as the two-to-one compression of the
//! Merkle gadget, and the trace builder that records every compression it
//! is asked for.
//!
//! Layout of the permutation:
//! - initial external linear layer
//! - 4 full rounds (constants on every lane, x^5 on every lane, external layer)
//! - 14 partial rounds (constant on lane 0, x^5 on lane 0, internal layer)
//! - 4 full rounds

use crate::config::domain_tag;
use crate::hash::{HashCaller, HashGadget};
use crate::m31::{M31, M31_PRIME};
use crate::trace::{reserve_rows, MainTraceRow};
use crate::{Result, TraceError};

/// Permutation width
pub const WIDTH: usize = 3;

/// Number of full rounds (split evenly before and after the partial rounds)
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds
pub const PARTIAL_ROUNDS: usize = 14;

/// Diagonal of the internal matrix, which is `J + diag(INTERNAL_DIAG)`
const INTERNAL_DIAG: [M31; WIDTH] = [M31::ONE, M31::ONE, M31::new(2)];

const ROUND_CONSTANT_SEED: u64 = 0x4d45_524b_4c45_5032; // "MERKLEP2"

const fn splitmix64(state: u64) -> (u64, u64) {
    let state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (state, z ^ (z >> 31))
}

type RoundConstants = ([[M31; WIDTH]; FULL_ROUNDS], [M31; PARTIAL_ROUNDS]);

const fn generate_round_constants() -> RoundConstants {
    let mut state = ROUND_CONSTANT_SEED;
    let mut external = [[M31::ZERO; WIDTH]; FULL_ROUNDS];
    let mut internal = [M31::ZERO; PARTIAL_ROUNDS];

    let mut r = 0;
    while r < FULL_ROUNDS {
        let mut i = 0;
        while i < WIDTH {
            let (next, out) = splitmix64(state);
            state = next;
            external[r][i] = M31::new((out >> 33) as u32);
            i += 1;
        }
        r += 1;
    }

    let mut r = 0;
    while r < PARTIAL_ROUNDS {
        let (next, out) = splitmix64(state);
        state = next;
        internal[r] = M31::new((out >> 33) as u32);
        r += 1;
    }

    (external, internal)
}

const ROUND_CONSTANTS: RoundConstants = generate_round_constants();

#[inline]
fn sbox(x: M31) -> M31 {
    let x2 = x.square();
    x2.square() * x
}

/// circ(2, 1, 1): every lane gains the sum of all lanes
#[inline]
fn external_linear_layer(state: &mut [M31; WIDTH]) {
    let sum = state[0] + state[1] + state[2];
    for lane in state.iter_mut() {
        *lane += sum;
    }
}

#[inline]
fn internal_linear_layer(state: &mut [M31; WIDTH]) {
    let sum = state[0] + state[1] + state[2];
    for (lane, diag) in state.iter_mut().zip(INTERNAL_DIAG) {
        *lane = *lane * diag + sum;
    }
}

fn full_round(state: &mut [M31; WIDTH], constants: &[M31; WIDTH]) {
    for (lane, rc) in state.iter_mut().zip(constants) {
        *lane = sbox(*lane + *rc);
    }
    external_linear_layer(state);
}

fn partial_round(state: &mut [M31; WIDTH], constant: M31) {
    state[0] = sbox(state[0] + constant);
    internal_linear_layer(state);
}

/// Apply the Poseidon2 permutation in place
pub fn permute(state: &mut [M31; WIDTH]) {
    let (external, internal) = &ROUND_CONSTANTS;
    let (first_half, second_half) = external.split_at(FULL_ROUNDS / 2);

    external_linear_layer(state);
    for constants in first_half {
        full_round(state, constants);
    }
    for constant in internal {
        partial_round(state, *constant);
    }
    for constants in second_half {
        full_round(state, constants);
    }
}

/// Two-to-one compression: first lane of `permute([a, b, 0])`, fed forward with `a`
pub fn compress(a: M31, b: M31) -> M31 {
    let mut state = [a, b, M31::ZERO];
    permute(&mut state);
    state[0] + a
}

/// One recorded compression
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poseidon2TraceEntry {
    pub clk: u32,
    pub input: [M31; 2],
    pub output: M31,
    pub caller: HashCaller,
}

/// Poseidon2 gadget: computes compressions and keeps one entry per call
#[derive(Clone, Debug, Default)]
pub struct Poseidon2TraceBuilder {
    entries: Vec<Poseidon2TraceEntry>,
    finalized: usize,
    start_row: usize,
    cursor: usize,
}

impl Poseidon2TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start writing rows at `row` of the main trace instead of row 0
    pub fn with_start_row(mut self, row: usize) -> Self {
        self.start_row = row;
        self.cursor = row;
        self
    }

    pub fn entries(&self) -> &[Poseidon2TraceEntry] {
        &self.entries
    }

    /// Next main-trace row `finalize` will write
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Hash `input` and record the call under `clk`.
    ///
    /// `clk` lands in an M31 column, so it must be below p.
    pub fn poseidon2_hash(&mut self, input: [M31; 2], clk: u32, caller: HashCaller) -> Result<M31> {
        check_tag(clk)?;
        Ok(self.record(input, clk, caller))
    }

    fn record(&mut self, input: [M31; 2], clk: u32, caller: HashCaller) -> M31 {
        let output = compress(input[0], input[1]);
        tracing::trace!(clk, ?caller, %output, "poseidon2 compression");
        self.entries.push(Poseidon2TraceEntry {
            clk,
            input,
            output,
            caller,
        });
        output
    }

    /// Write one row per pending entry into `main_trace`, starting at the cursor.
    ///
    /// Nothing is written if the pending rows do not fit.
    pub fn finalize(&mut self, main_trace: &mut [MainTraceRow]) -> Result<()> {
        let pending = &self.entries[self.finalized..];
        for entry in pending {
            check_tag(entry.clk)?;
        }
        let rows = reserve_rows(main_trace, self.cursor, pending.len())?;

        for (dest, src) in rows.iter_mut().zip(pending) {
            dest.poseidon2_clk = M31::from(src.clk);
            dest.poseidon2_a = src.input[0];
            dest.poseidon2_b = src.input[1];
            dest.poseidon2_output = src.output;
            dest.poseidon2_caller = src.caller.selector();
            dest.poseidon2_sel = M31::ONE;
        }

        tracing::debug!(
            rows = pending.len(),
            start = self.cursor,
            "poseidon2 trace finalized"
        );
        self.cursor += pending.len();
        self.finalized = self.entries.len();
        Ok(())
    }

    /// Forget all entries and rewind the cursor to the start row
    pub fn reset(&mut self) {
        self.entries.clear();
        self.finalized = 0;
        self.cursor = self.start_row;
    }
}

fn check_tag(tag: u32) -> Result<()> {
    if tag >= M31_PRIME {
        return Err(TraceError::DomainTagOutOfField { tag });
    }
    Ok(())
}

impl HashGadget for Poseidon2TraceBuilder {
    // Out-of-field tags are recorded here and rejected by `finalize`
    fn compress(&mut self, left: M31, right: M31, domain_tag: u32, caller: HashCaller) -> M31 {
        self.record([left, right], domain_tag, caller)
    }

    fn reset(&mut self) {
        Poseidon2TraceBuilder::reset(self)
    }
}

/// Find the recorded compression for `level` of the check issued at `clk`
pub fn find_merkle_hash(entries: &[Poseidon2TraceEntry], clk: u32, level: u32) -> Option<&Poseidon2TraceEntry> {
    let tag = domain_tag(clk, level);
    entries
        .iter()
        .find(|e| e.caller == HashCaller::MerkleTree && e.clk == tag)
}
