//! Merkle membership trace gadget
//!
//! Witness generation for Merkle-path membership checks in an M31 zkVM.
//! During execution every check goes through
//! [`MerkleTreeTraceBuilder::check_membership`], which hashes the path
//! through the Poseidon2 gadget and returns the verdict to the VM. Once the
//! run is over, [`MerkleTreeTraceBuilder::finalize`] expands the recorded
//! checks into one main-trace row per path level.

pub mod config;
pub mod error;
pub mod hash;
pub mod m31;
pub mod merkle;
pub mod merkle_trace;
pub mod poseidon2;
pub mod relations;
pub mod stwo_trace;
pub mod trace;

// Re-exports for convenience
pub use error::{Result, TraceError};
pub use hash::{HashCaller, HashGadget};
pub use m31::{M31, M31_PRIME};
pub use merkle::MerkleTree;
pub use merkle_trace::{MerkleCheckEntry, MerkleTreeTraceBuilder};
pub use poseidon2::{Poseidon2TraceBuilder, Poseidon2TraceEntry};
pub use trace::{MainTraceRow, N_MERKLE_COLUMNS};
