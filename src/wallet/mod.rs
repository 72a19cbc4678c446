use num_bigint::BigUint;
use rand::rngs::OsRng;

use crate::crypto::{Network, PrivateKey, S256Point, Signature};
use crate::error::CryptoError;
use crate::transaction::Transaction;

/// A key pair plus the address derived from its compressed public key.
#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: PrivateKey,
    address: String,
}

impl Wallet {
    /// Fresh random wallet.
    pub fn generate(network: Network) -> Self {
        let private_key = PrivateKey::generate(&mut OsRng);
        Self::from_key(private_key, network)
            .expect("generated key is never the point at infinity")
    }

    pub fn from_private_key_hex(private_key_hex: &str, network: Network) -> Result<Self, CryptoError> {
        Self::from_key(PrivateKey::from_hex(private_key_hex)?, network)
    }

    fn from_key(private_key: PrivateKey, network: Network) -> Result<Self, CryptoError> {
        let address = private_key.point().address(true, network)?;
        Ok(Self {
            private_key,
            address,
        })
    }

    pub fn private_key_hex(&self) -> String {
        self.private_key.hex()
    }

    /// Compressed SEC public key, hex.
    pub fn public_key_hex(&self) -> String {
        let sec = self
            .private_key
            .point()
            .sec(true)
            .expect("public point is never at infinity");
        hex::encode(sec)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Build and sign a transfer from this wallet.
    pub fn create_transaction(&self, recipient: &str, value: f64) -> Result<Transaction, CryptoError> {
        let mut tx = Transaction::new(self.address.clone(), recipient, value);
        let signature = self.private_key.sign(&tx.sighash(), &mut OsRng)?;
        tx.sender_public_key = Some(self.public_key_hex());
        tx.signature = Some(signature);
        Ok(tx)
    }
}

/// Generate a new key pair and return (priv_hex, pub_hex_compressed, address).
pub fn generate_keypair_hex(network: Network) -> (String, String, String) {
    let wallet = Wallet::generate(network);
    (
        wallet.private_key_hex(),
        wallet.public_key_hex(),
        wallet.address().to_string(),
    )
}

/// Derive the address of a hex SEC public key (compressed or not).
pub fn pubkey_to_address(pubkey_hex: &str, network: Network) -> Result<String, CryptoError> {
    let sec = hex::decode(pubkey_hex)?;
    S256Point::parse(&sec)?.address(sec.len() == 33, network)
}

/// Verify a signature against a hex SEC public key and 32-byte message hash.
pub fn verify_signature_hex(
    pubkey_hex: &str,
    signature: &Signature,
    msg32: [u8; 32],
) -> Result<bool, CryptoError> {
    let point = S256Point::parse(&hex::decode(pubkey_hex)?)?;
    Ok(point.verify(&BigUint::from_bytes_be(&msg32), signature))
}
