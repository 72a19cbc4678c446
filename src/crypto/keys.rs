use num_bigint::{BigUint, RandBigInt};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::s256::{G, N, S256Point, in_scalar_range};
use crate::error::CryptoError;

/// ECDSA signature `(r, s)`. Serialized as two 64-char hex strings.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl Signature {
    /// Whether `s` lies in the lower half of the group order. Transactions
    /// only accept low-s signatures.
    pub fn is_low_s(&self) -> bool {
        self.s <= &*N / 2u32
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:064x}, {:064x})", self.r, self.s)
    }
}

#[derive(Serialize, Deserialize)]
struct SignatureHex {
    r: String,
    s: String,
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SignatureHex {
            r: format!("{:064x}", self.r),
            s: format!("{:064x}", self.s),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = SignatureHex::deserialize(deserializer)?;
        let parse = |s: &str| {
            BigUint::parse_bytes(s.as_bytes(), 16)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid hex scalar {s:?}")))
        };
        Ok(Signature {
            r: parse(&raw.r)?,
            s: parse(&raw.s)?,
        })
    }
}

/// Secret scalar in `[1, N-1]` together with its public point.
#[derive(Clone)]
pub struct PrivateKey {
    secret: BigUint,
    point: S256Point,
}

impl PrivateKey {
    pub fn new(secret: BigUint) -> Result<Self, CryptoError> {
        if !in_scalar_range(&secret) {
            return Err(CryptoError::InvalidSecret);
        }
        let point = G.scalar_mul(&secret)?;
        Ok(Self { secret, point })
    }

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let secret = rng.gen_biguint_range(&BigUint::from(1u32), &N);
            if let Ok(key) = Self::new(secret) {
                return key;
            }
        }
    }

    pub fn from_hex(hex_secret: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_secret.trim())?;
        Self::new(BigUint::from_bytes_be(&bytes))
    }

    pub fn hex(&self) -> String {
        format!("{:064x}", self.secret)
    }

    pub fn point(&self) -> &S256Point {
        &self.point
    }

    /// Sign message hash `z` with a fresh random nonce `k`.
    /// `s` is normalised to the lower half of the group order.
    pub fn sign<R: Rng + ?Sized>(&self, z: &BigUint, rng: &mut R) -> Result<Signature, CryptoError> {
        let n = &*N;
        loop {
            let k = rng.gen_biguint_range(&BigUint::from(1u32), n);
            let r = match G.scalar_mul(&k)?.x() {
                Some(x) => x % n,
                None => continue,
            };
            if !in_scalar_range(&r) {
                continue;
            }
            let k_inv = k.modpow(&(n - 2u32), n);
            let mut s = ((z + &r * &self.secret) * k_inv) % n;
            if !in_scalar_range(&s) {
                continue;
            }
            if s > n / 2u32 {
                s = n - s;
            }
            let sig = Signature { r, s };
            debug_assert!(sig.is_low_s());
            return Ok(sig);
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the secret
        write!(f, "PrivateKey({:?})", self.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::s256::message_hash;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn secret_must_be_in_range() {
        assert_eq!(
            PrivateKey::new(BigUint::from(0u32)).unwrap_err(),
            CryptoError::InvalidSecret
        );
        assert_eq!(PrivateKey::new(N.clone()).unwrap_err(), CryptoError::InvalidSecret);
        assert!(PrivateKey::new(&*N - 1u32).is_ok());
    }

    #[test]
    fn hex_round_trip() {
        let key = PrivateKey::new(BigUint::from(12345u32)).unwrap();
        let again = PrivateKey::from_hex(&key.hex()).unwrap();
        assert_eq!(again.point(), key.point());
        assert_eq!(key.hex().len(), 64);
    }

    #[test]
    fn bad_hex_secret_is_a_hex_error() {
        assert_eq!(
            PrivateKey::from_hex("abc").unwrap_err(),
            CryptoError::Hex(hex::FromHexError::OddLength)
        );
        assert!(matches!(
            PrivateKey::from_hex("zz"),
            Err(CryptoError::Hex(_))
        ));
    }

    #[test]
    fn signatures_are_low_s_and_the_mirror_still_verifies() {
        let mut rng = StdRng::seed_from_u64(3);
        let key = PrivateKey::generate(&mut rng);
        for i in 0u32..8 {
            let z = message_hash(&i.to_be_bytes());
            let sig = key.sign(&z, &mut rng).unwrap();
            assert!(sig.is_low_s());

            let mirrored = Signature {
                r: sig.r.clone(),
                s: &*N - &sig.s,
            };
            assert!(!mirrored.is_low_s());
            assert!(key.point().verify(&z, &mirrored));
        }
    }

    #[test]
    fn signature_verifies_and_bit_flips_fail() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = PrivateKey::generate(&mut rng);
        let z = message_hash(b"A pays B two coins");
        let sig = key.sign(&z, &mut rng).unwrap();
        assert!(key.point().verify(&z, &sig));

        for bit in [0u64, 17, 200, 255] {
            let flipped_z = &z ^ (BigUint::from(1u32) << bit);
            assert!(!key.point().verify(&flipped_z, &sig));

            let bad_r = Signature {
                r: &sig.r ^ (BigUint::from(1u32) << bit),
                s: sig.s.clone(),
            };
            assert!(!key.point().verify(&z, &bad_r));

            let bad_s = Signature {
                r: sig.r.clone(),
                s: &sig.s ^ (BigUint::from(1u32) << bit),
            };
            assert!(!key.point().verify(&z, &bad_s));
        }
    }

    #[test]
    fn other_key_does_not_verify() {
        let mut rng = StdRng::seed_from_u64(11);
        let alice = PrivateKey::generate(&mut rng);
        let bob = PrivateKey::generate(&mut rng);
        let z = message_hash(b"hello");
        let sig = alice.sign(&z, &mut rng).unwrap();
        assert!(!bob.point().verify(&z, &sig));
    }

    #[test]
    fn signature_serde_uses_hex() {
        let sig = Signature {
            r: BigUint::from(255u32),
            s: BigUint::from(1u32),
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["r"].as_str().unwrap().len(), 64);
        assert!(json["r"].as_str().unwrap().ends_with("ff"));
        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }
}
