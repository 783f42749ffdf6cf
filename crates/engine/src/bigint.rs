//! Arbitrary-precision integers (`Value::Long`).
//!
//! `Value::Short` covers the fast path (anything fitting an `i64`);
//! `IntegerBig` only appears once a computation overflows it. Wraps
//! `num-bigint::BigInt` rather than hand-rolling digit arithmetic — several
//! repos in this corpus (substrate, parity-common, ethrex, forest) already
//! depend on it for the identical reason.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegerBig(BigInt);

impl IntegerBig {
    pub fn from_i64(n: i64) -> Self {
        IntegerBig(BigInt::from(n))
    }

    pub fn zero() -> Self {
        IntegerBig(BigInt::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Demote back to a `Short` if the value now fits an `i64`. Used after
    /// arithmetic that may have shrunk a `Long` back into range.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    pub fn add(&self, other: &IntegerBig) -> IntegerBig {
        IntegerBig(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &IntegerBig) -> IntegerBig {
        IntegerBig(&self.0 - &other.0)
    }

    pub fn mul(&self, other: &IntegerBig) -> IntegerBig {
        IntegerBig(&self.0 * &other.0)
    }

    pub fn neg(&self) -> IntegerBig {
        IntegerBig(-&self.0)
    }

    /// 32-bit fold used as the `Value` hash contribution. Folds the
    /// little-endian digit words with XOR, matching the whole-collection
    /// `HS` fold's fixed-width-word convention elsewhere in this crate.
    pub fn hash32(&self) -> u32 {
        let (sign, bytes) = self.0.to_bytes_le();
        let mut acc: u32 = match sign {
            num_bigint::Sign::Minus => 0x9E37_79B9,
            _ => 0,
        };
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            acc ^= u32::from_le_bytes(word);
        }
        acc
    }
}

impl fmt::Display for IntegerBig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Hash for IntegerBig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl From<BigInt> for IntegerBig {
    fn from(value: BigInt) -> Self {
        IntegerBig(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflowing_i64_stays_exact() {
        let a = IntegerBig::from_i64(i64::MAX);
        let b = IntegerBig::from_i64(1);
        let sum = a.add(&b);
        assert!(sum.to_i64().is_none());
        assert_eq!(sum.to_string(), "9223372036854775808");
    }

    #[test]
    fn demotes_back_to_short_when_in_range() {
        let a = IntegerBig::from_i64(10);
        let b = IntegerBig::from_i64(3);
        assert_eq!(a.sub(&b).to_i64(), Some(7));
    }
}
