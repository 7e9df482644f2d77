//! Trace layout constants shared by the gadgets

use crate::m31::M31_PRIME;

/// Bits reserved below the VM clock for the path level in a domain tag
pub const CLK_SHIFT: u32 = 5;

/// Up to 32 hashes per clk
pub const MAX_LEVELS_PER_CLK: usize = 1 << CLK_SHIFT;

/// Largest clock whose tags `(clk << 5) + level` all stay below p
pub const MAX_CLK: u32 = (M31_PRIME >> CLK_SHIFT) - 1;

/// Domain-separation tag of the hash computed at `level` of the check issued at `clk`.
///
/// The hashing gadget's rows carry this tag, and so does the Merkle row for
/// the same level, which is how the two sub-traces are matched up.
#[inline]
pub const fn domain_tag(clk: u32, level: u32) -> u32 {
    (clk << CLK_SHIFT) + level
}
