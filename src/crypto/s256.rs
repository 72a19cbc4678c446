//! secp256k1 over the scratch field/point types: constants, SEC
//! serialization, addresses and ECDSA verification.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::field::FieldElement;
use super::keys::Signature;
use super::point::Point;
use crate::error::CryptoError;

/// Field prime, 2^256 - 2^32 - 977.
pub static P: LazyLock<BigUint> =
    LazyLock::new(|| (BigUint::from(1u32) << 256) - (BigUint::from(1u32) << 32) - 977u32);

/// Order of the group generated by `G`.
pub static N: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(
        b"fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        16,
    )
    .expect("valid group order literal")
});

pub static G: LazyLock<S256Point> = LazyLock::new(|| {
    let x = BigUint::parse_bytes(
        b"79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        16,
    )
    .expect("valid generator x literal");
    let y = BigUint::parse_bytes(
        b"483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
        16,
    )
    .expect("valid generator y literal");
    S256Point::new(x, y).expect("generator lies on secp256k1")
});

const A: u32 = 0;
const B: u32 = 7;

/// Element of the secp256k1 base field.
fn s256_field(num: BigUint) -> Result<FieldElement, CryptoError> {
    FieldElement::new(num, P.clone())
}

fn curve_coefficients() -> (FieldElement, FieldElement) {
    (
        FieldElement::new(BigUint::from(A), P.clone()).expect("a < P"),
        FieldElement::new(BigUint::from(B), P.clone()).expect("b < P"),
    )
}

/// Address version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(format!("unknown network {other:?}")),
        }
    }
}

/// Big-endian, left-padded to 32 bytes.
pub fn to_32_bytes(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// A point on secp256k1.
#[derive(Clone, PartialEq)]
pub struct S256Point(Point<FieldElement>);

impl S256Point {
    pub fn new(x: BigUint, y: BigUint) -> Result<Self, CryptoError> {
        let (a, b) = curve_coefficients();
        Point::new(s256_field(x)?, s256_field(y)?, a, b).map(Self)
    }

    pub fn infinity() -> Self {
        let (a, b) = curve_coefficients();
        Self(Point::infinity(a, b))
    }

    pub fn generator() -> &'static S256Point {
        &G
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_infinity()
    }

    pub fn x(&self) -> Option<&BigUint> {
        self.0.x().map(FieldElement::num)
    }

    pub fn y(&self) -> Option<&BigUint> {
        self.0.y().map(FieldElement::num)
    }

    pub fn add(&self, other: &Self) -> Result<Self, CryptoError> {
        self.0.add(&other.0).map(Self)
    }

    /// `k * self`, with `k` reduced mod `N` first.
    pub fn scalar_mul(&self, k: &BigUint) -> Result<Self, CryptoError> {
        self.0.scalar_mul(&(k % &*N)).map(Self)
    }

    /// ECDSA verification of `sig` over message hash `z`.
    pub fn verify(&self, z: &BigUint, sig: &Signature) -> bool {
        let n = &*N;
        let s_inv = sig.s.modpow(&(n - 2u32), n);
        let u = (z * &s_inv) % n;
        let v = (&sig.r * &s_inv) % n;
        let total = G
            .scalar_mul(&u)
            .and_then(|ug| self.scalar_mul(&v).and_then(|vp| ug.add(&vp)));
        match total {
            Ok(point) => point.x() == Some(&sig.r),
            Err(_) => false,
        }
    }

    /// SEC serialization: 33 bytes compressed or 65 bytes uncompressed.
    pub fn sec(&self, compressed: bool) -> Result<Vec<u8>, CryptoError> {
        let (x, y) = match (self.x(), self.y()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(CryptoError::InvalidSec("point at infinity")),
        };
        let mut out = Vec::with_capacity(if compressed { 33 } else { 65 });
        if compressed {
            out.push(if y.bit(0) { 0x03 } else { 0x02 });
            out.extend_from_slice(&to_32_bytes(x));
        } else {
            out.push(0x04);
            out.extend_from_slice(&to_32_bytes(x));
            out.extend_from_slice(&to_32_bytes(y));
        }
        Ok(out)
    }

    /// Parse a SEC-encoded public key. Compressed keys recover `y` from
    /// `x` with the square root `alpha^((P+1)/4)`, valid since P ≡ 3 mod 4.
    pub fn parse(sec: &[u8]) -> Result<Self, CryptoError> {
        match (sec.first(), sec.len()) {
            (Some(0x04), 65) => {
                let x = BigUint::from_bytes_be(&sec[1..33]);
                let y = BigUint::from_bytes_be(&sec[33..65]);
                Self::new(x, y)
            }
            (Some(prefix @ (0x02 | 0x03)), 33) => {
                let want_odd = *prefix == 0x03;
                let x = s256_field(BigUint::from_bytes_be(&sec[1..]))?;
                let (_, b) = curve_coefficients();
                let alpha = x.pow_u64(3).add(&b)?;
                let exponent = BigInt::from((&*P + 1u32) / 4u32);
                let beta = alpha.pow(&exponent);
                let y = if beta.num().bit(0) == want_odd {
                    beta
                } else {
                    beta.neg()
                };
                Self::new(x.num().clone(), y.num().clone())
            }
            (Some(0x02 | 0x03 | 0x04), _) => Err(CryptoError::InvalidSec("bad length")),
            (Some(_), _) => Err(CryptoError::InvalidSec("unknown prefix")),
            (None, _) => Err(CryptoError::InvalidSec("empty input")),
        }
    }

    pub fn hash160(&self, compressed: bool) -> Result<[u8; 20], CryptoError> {
        Ok(hash160(&self.sec(compressed)?))
    }

    /// Base58check of `prefix || hash160(sec)`.
    pub fn address(&self, compressed: bool, network: Network) -> Result<String, CryptoError> {
        let mut payload = Vec::with_capacity(21);
        payload.push(network.prefix());
        payload.extend_from_slice(&self.hash160(compressed)?);
        Ok(bs58::encode(payload).with_check().into_string())
    }
}

impl fmt::Debug for S256Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "S256Point({x:064x}, {y:064x})"),
            _ => write!(f, "S256Point(infinity)"),
        }
    }
}

/// Hash an arbitrary message to the integer `z` used by ECDSA.
pub fn message_hash(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&Sha256::digest(bytes))
}

/// Zero is never a valid signature component.
pub(crate) fn in_scalar_range(n: &BigUint) -> bool {
    !n.is_zero() && n < &*N
}
