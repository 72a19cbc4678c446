//! Prime field elements.
//!
//! A `FieldElement` carries its own modulus, so elements of different
//! fields can coexist at runtime. Every binary operation checks that both
//! operands share the modulus and returns `CryptoError::FieldMismatch`
//! otherwise.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use std::fmt;

use crate::error::CryptoError;

/// Element of F_p, with `0 <= num < prime`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    /// Build an element, rejecting values outside `[0, prime)`.
    pub fn new(num: BigUint, prime: BigUint) -> Result<Self, CryptoError> {
        if num >= prime {
            return Err(CryptoError::OutOfRange {
                value: num.to_string(),
                modulus: prime.to_string(),
            });
        }
        Ok(Self { num, prime })
    }

    pub fn from_u64(num: u64, prime: u64) -> Result<Self, CryptoError> {
        Self::new(BigUint::from(num), BigUint::from(prime))
    }

    pub fn num(&self) -> &BigUint {
        &self.num
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn same_field(&self, other: &Self, op: &'static str) -> Result<(), CryptoError> {
        if self.prime != other.prime {
            return Err(CryptoError::FieldMismatch { op });
        }
        Ok(())
    }

    // Result of an operation is already reduced, so the range check is skipped.
    fn reduced(&self, num: BigUint) -> Self {
        Self {
            num,
            prime: self.prime.clone(),
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self, CryptoError> {
        self.same_field(other, "add")?;
        Ok(self.reduced((&self.num + &other.num) % &self.prime))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, CryptoError> {
        self.same_field(other, "subtract")?;
        Ok(self.reduced((&self.num + &self.prime - &other.num) % &self.prime))
    }

    pub fn mul(&self, other: &Self) -> Result<Self, CryptoError> {
        self.same_field(other, "multiply")?;
        Ok(self.reduced((&self.num * &other.num) % &self.prime))
    }

    /// `self^exponent`. The exponent is first reduced mod `prime - 1`
    /// (Fermat), which makes negative exponents well defined.
    pub fn pow(&self, exponent: &BigInt) -> Self {
        let order = BigInt::from_biguint(Sign::Plus, &self.prime - 1u32);
        let mut n = exponent % &order;
        if n.sign() == Sign::Minus {
            n += &order;
        }
        let n = n.magnitude();
        self.reduced(self.num.modpow(n, &self.prime))
    }

    pub fn pow_u64(&self, exponent: u64) -> Self {
        self.pow(&BigInt::from(exponent))
    }

    /// `self / other`, computed as `self * other^(prime-2)`.
    pub fn div(&self, other: &Self) -> Result<Self, CryptoError> {
        self.same_field(other, "divide")?;
        if other.is_zero() {
            return Err(CryptoError::DivisionByZero);
        }
        let inverse = other.num.modpow(&(&self.prime - 2u32), &self.prime);
        Ok(self.reduced((&self.num * inverse) % &self.prime))
    }

    /// Multiply by a plain integer coefficient.
    pub fn scale(&self, coefficient: &BigUint) -> Self {
        self.reduced((&self.num * coefficient) % &self.prime)
    }

    pub fn neg(&self) -> Self {
        if self.num.is_zero() {
            return self.clone();
        }
        self.reduced(&self.prime - &self.num)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F_{}({})", self.prime, self.num)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
