//! Hashing gadget interface
//!
//! Gadgets that need a two-to-one compression call into a `HashGadget`
//! rather than a bare hash function: the gadget proves its own hashes and
//! keeps a sub-trace of every call, keyed by the domain tag it was given.

use crate::m31::M31;

/// Identifies which gadget requested a hash
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashCaller {
    /// Issued directly by a VM instruction
    Direct,
    /// One level of a Merkle membership check
    MerkleTree,
}

impl HashCaller {
    /// Field encoding used in the hashing gadget's caller column
    pub fn selector(self) -> M31 {
        match self {
            Self::Direct => M31::ZERO,
            Self::MerkleTree => M31::ONE,
        }
    }
}

/// Two-to-one compression with trace recording.
pub trait HashGadget {
    /// Compress `(left, right)`, recording the call under `domain_tag`.
    ///
    /// Must be deterministic: equal inputs give equal outputs whatever the tag.
    fn compress(&mut self, left: M31, right: M31, domain_tag: u32, caller: HashCaller) -> M31;

    /// Drop everything recorded so far
    fn reset(&mut self);
}

impl<H: HashGadget + ?Sized> HashGadget for &mut H {
    fn compress(&mut self, left: M31, right: M31, domain_tag: u32, caller: HashCaller) -> M31 {
        (**self).compress(left, right, domain_tag, caller)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_selectors_are_distinct() {
        assert_ne!(HashCaller::Direct.selector(), HashCaller::MerkleTree.selector());
    }
}
