//! M31 (Mersenne-31) field elements
//!
//! p = 2^31 - 1. Every trace column of the gadget holds one of these, and
//! the stwo backend commits to the same field, so exporting is a plain
//! re-wrap of the canonical value.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

/// The Mersenne-31 prime
pub const M31_PRIME: u32 = (1 << 31) - 1;

/// An element of the M31 field, always kept in canonical form `[0, p)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct M31(u32);

impl M31 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    /// Create a new element, reducing modulo p
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(Self::reduce(value as u64))
    }

    /// x mod (2^31 - 1) = (x & p) + (x >> 31), folded twice for 62-bit inputs
    #[inline]
    pub const fn reduce(x: u64) -> u32 {
        let folded = (x & M31_PRIME as u64) + (x >> 31);
        let folded = (folded & M31_PRIME as u64) + (folded >> 31);
        let r = folded as u32;
        if r >= M31_PRIME {
            r - M31_PRIME
        } else {
            r
        }
    }

    /// Canonical representative in `[0, p)`
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn square(self) -> Self {
        self * self
    }

    /// Square-and-multiply exponentiation
    pub fn pow(self, mut exp: u32) -> Self {
        let mut base = self;
        let mut acc = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            base = base.square();
            exp >>= 1;
        }
        acc
    }

    /// Multiplicative inverse via Fermat: a^(p-2). Returns `None` for zero.
    pub fn inv(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self.pow(M31_PRIME - 2))
        }
    }

    /// Inverse, with the inverse of zero defined as zero.
    ///
    /// This is the witness for "is this value zero" checks: `x * w` is 1 when
    /// `x != 0` and 0 otherwise.
    #[inline]
    pub fn inverse_or_zero(self) -> Self {
        self.inv().unwrap_or(Self::ZERO)
    }
}

impl From<u32> for M31 {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<bool> for M31 {
    fn from(bit: bool) -> Self {
        if bit {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl From<M31> for u32 {
    fn from(value: M31) -> Self {
        value.0
    }
}

impl fmt::Display for M31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for M31 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(Self::reduce(self.0 as u64 + rhs.0 as u64))
    }
}

impl Sub for M31 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(M31_PRIME - rhs.0 + self.0)
        }
    }
}

impl Mul for M31 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(Self::reduce(self.0 as u64 * rhs.0 as u64))
    }
}

impl Neg for M31 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            Self(M31_PRIME - self.0)
        }
    }
}

impl AddAssign for M31 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for M31 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for M31 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Zero for M31 {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl One for M31 {
    fn one() -> Self {
        Self::ONE
    }
}
