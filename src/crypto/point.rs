//! Points on y² = x³ + ax + b.
//!
//! The group law is written once against [`Coordinate`], which is
//! implemented for prime field elements and for `f64` reals. Real
//! coordinates are only useful for small textbook curves with exact
//! integer points; secp256k1 always uses field elements.

use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;

use super::field::FieldElement;
use crate::error::CryptoError;

/// Arithmetic a curve coordinate must support. Binary operations are
/// fallible because field elements can come from different fields.
pub trait Coordinate: Clone + PartialEq + fmt::Debug {
    fn try_add(&self, rhs: &Self) -> Result<Self, CryptoError>;
    fn try_sub(&self, rhs: &Self) -> Result<Self, CryptoError>;
    fn try_mul(&self, rhs: &Self) -> Result<Self, CryptoError>;
    fn try_div(&self, rhs: &Self) -> Result<Self, CryptoError>;
    /// Multiply by a small integer constant.
    fn times(&self, k: u32) -> Self;
    fn negate(&self) -> Self;
    fn is_zero(&self) -> bool;
}

impl Coordinate for FieldElement {
    fn try_add(&self, rhs: &Self) -> Result<Self, CryptoError> {
        self.add(rhs)
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self, CryptoError> {
        self.sub(rhs)
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self, CryptoError> {
        self.mul(rhs)
    }

    fn try_div(&self, rhs: &Self) -> Result<Self, CryptoError> {
        self.div(rhs)
    }

    fn times(&self, k: u32) -> Self {
        self.scale(&BigUint::from(k))
    }

    fn negate(&self) -> Self {
        self.neg()
    }

    fn is_zero(&self) -> bool {
        FieldElement::is_zero(self)
    }
}

impl Coordinate for f64 {
    fn try_add(&self, rhs: &Self) -> Result<Self, CryptoError> {
        Ok(self + rhs)
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self, CryptoError> {
        Ok(self - rhs)
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self, CryptoError> {
        Ok(self * rhs)
    }

    fn try_div(&self, rhs: &Self) -> Result<Self, CryptoError> {
        if *rhs == 0.0 {
            return Err(CryptoError::DivisionByZero);
        }
        Ok(self / rhs)
    }

    fn times(&self, k: u32) -> Self {
        self * f64::from(k)
    }

    fn negate(&self) -> Self {
        -self
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

/// A curve point. `xy == None` is the point at infinity.
#[derive(Clone, PartialEq)]
pub struct Point<C> {
    xy: Option<(C, C)>,
    a: C,
    b: C,
}

impl<C: Coordinate> Point<C> {
    /// Construct an affine point, checking the curve equation.
    pub fn new(x: C, y: C, a: C, b: C) -> Result<Self, CryptoError> {
        let lhs = y.try_mul(&y)?;
        let rhs = x
            .try_mul(&x)?
            .try_mul(&x)?
            .try_add(&a.try_mul(&x)?)?
            .try_add(&b)?;
        if lhs != rhs {
            return Err(CryptoError::NotOnCurve {
                x: format!("{x:?}"),
                y: format!("{y:?}"),
            });
        }
        Ok(Self {
            xy: Some((x, y)),
            a,
            b,
        })
    }

    pub fn infinity(a: C, b: C) -> Self {
        Self { xy: None, a, b }
    }

    pub fn is_infinity(&self) -> bool {
        self.xy.is_none()
    }

    pub fn x(&self) -> Option<&C> {
        self.xy.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&C> {
        self.xy.as_ref().map(|(_, y)| y)
    }

    pub fn a(&self) -> &C {
        &self.a
    }

    pub fn b(&self) -> &C {
        &self.b
    }

    fn identity(&self) -> Self {
        Self::infinity(self.a.clone(), self.b.clone())
    }

    fn affine(&self, x: C, y: C) -> Self {
        // Chord and tangent results stay on the curve, no need to re-check.
        Self {
            xy: Some((x, y)),
            a: self.a.clone(),
            b: self.b.clone(),
        }
    }

    /// Group law.
    pub fn add(&self, other: &Self) -> Result<Self, CryptoError> {
        if self.a != other.a || self.b != other.b {
            return Err(CryptoError::CurveMismatch);
        }
        let (x1, y1) = match &self.xy {
            None => return Ok(other.clone()),
            Some(xy) => xy,
        };
        let (x2, y2) = match &other.xy {
            None => return Ok(self.clone()),
            Some(xy) => xy,
        };

        if x1 == x2 && y1 != y2 {
            return Ok(self.identity());
        }
        if x1 != x2 {
            let s = y2.try_sub(y1)?.try_div(&x2.try_sub(x1)?)?;
            return self.chord(&s, x1, y1, x2);
        }
        self.double()
    }

    /// Tangent doubling, `2P`.
    pub fn double(&self) -> Result<Self, CryptoError> {
        let (x1, y1) = match &self.xy {
            None => return Ok(self.clone()),
            Some(xy) => xy,
        };
        if y1.is_zero() {
            return Ok(self.identity());
        }
        let s = x1
            .try_mul(x1)?
            .times(3)
            .try_add(&self.a)?
            .try_div(&y1.times(2))?;
        self.chord(&s, x1, y1, x1)
    }

    fn chord(&self, s: &C, x1: &C, y1: &C, x2: &C) -> Result<Self, CryptoError> {
        let x3 = s.try_mul(s)?.try_sub(x1)?.try_sub(x2)?;
        let y3 = s.try_mul(&x1.try_sub(&x3)?)?.try_sub(y1)?;
        Ok(self.affine(x3, y3))
    }

    pub fn neg(&self) -> Self {
        match &self.xy {
            None => self.clone(),
            Some((x, y)) => self.affine(x.clone(), y.negate()),
        }
    }

    /// `k * self` by double-and-add, least significant bit first.
    ///
    /// Not constant time: the sequence of additions depends on the bits of
    /// `k`, which leaks secret scalars through timing.
    pub fn scalar_mul(&self, k: &BigUint) -> Result<Self, CryptoError> {
        let mut result = self.identity();
        if k.is_zero() {
            return Ok(result);
        }
        let mut current = self.clone();
        for i in 0..k.bits() {
            if k.bit(i) {
                result = result.add(&current)?;
            }
            current = current.double()?;
        }
        Ok(result)
    }
}

impl<C: Coordinate> fmt::Debug for Point<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.xy {
            None => write!(f, "Point(infinity)"),
            Some((x, y)) => write!(f, "Point({x:?}, {y:?})_{:?}_{:?}", self.a, self.b),
        }
    }
}
