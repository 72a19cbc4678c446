use chrono::Utc;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::blockchain::block::canonical_json;
use crate::config::MINING_SENDER;
use crate::crypto::s256::to_32_bytes;
use crate::crypto::{Network, Signature, message_hash};
use crate::error::TransactionError;
use crate::wallet::{pubkey_to_address, verify_signature_hex};

/// Seconds since the Unix epoch, with microsecond precision.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A value transfer between two addresses.
///
/// Everything but the reserved mining sender must carry the sender's SEC
/// public key (hex) and a signature over [`Transaction::signing_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender_blockchain_address: String,
    pub recipient_blockchain_address: String,
    pub value: f64,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct SigningBody<'a> {
    recipient_blockchain_address: &'a str,
    sender_blockchain_address: &'a str,
    timestamp: f64,
    value: f64,
}

impl Transaction {
    /// Unsigned transfer stamped with the current time.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, value: f64) -> Self {
        Self {
            sender_blockchain_address: sender.into(),
            recipient_blockchain_address: recipient.into(),
            value,
            timestamp: now_timestamp(),
            sender_public_key: None,
            signature: None,
        }
    }

    /// Mining reward paid by the reserved sender.
    pub fn reward(recipient: impl Into<String>, value: f64) -> Self {
        Self::new(MINING_SENDER, recipient, value)
    }

    pub fn is_reward(&self) -> bool {
        self.sender_blockchain_address == MINING_SENDER
    }

    /// Canonical (sorted-key) JSON of the signed fields. Credentials are
    /// excluded so the payload is the same before and after signing.
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_json(&SigningBody {
            recipient_blockchain_address: &self.recipient_blockchain_address,
            sender_blockchain_address: &self.sender_blockchain_address,
            timestamp: self.timestamp,
            value: self.value,
        })
        .into_bytes()
    }

    /// SHA-256 of the signing payload, as the ECDSA message integer.
    pub fn sighash(&self) -> BigUint {
        message_hash(&self.signing_payload())
    }

    /// Full canonical encoding, credentials included. Two transactions are
    /// the same transaction iff these strings are equal.
    pub fn canonical_json(&self) -> String {
        canonical_json(self)
    }

    /// Check the attached public key owns the sender address and signed
    /// this transaction with a low-s signature.
    pub fn verify_signature(&self, network: Network) -> Result<(), TransactionError> {
        let (Some(public_key), Some(signature)) = (&self.sender_public_key, &self.signature) else {
            return Err(TransactionError::MissingCredentials);
        };
        let address =
            pubkey_to_address(public_key, network).map_err(TransactionError::MalformedKey)?;
        if address != self.sender_blockchain_address {
            return Err(TransactionError::AddressMismatch);
        }
        if !signature.is_low_s() {
            return Err(TransactionError::InvalidSignature);
        }
        let ok = verify_signature_hex(public_key, signature, to_32_bytes(&self.sighash()))
            .map_err(TransactionError::MalformedKey)?;
        if !ok {
            return Err(TransactionError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::s256::N;
    use crate::wallet::Wallet;

    #[test]
    fn signing_payload_has_sorted_keys_and_no_credentials() {
        let mut tx = Transaction::new("alice", "bob", 2.0);
        tx.timestamp = 1.5;
        let payload = String::from_utf8(tx.signing_payload()).unwrap();
        assert_eq!(
            payload,
            r#"{"recipient_blockchain_address":"bob","sender_blockchain_address":"alice","timestamp":1.5,"value":2.0}"#
        );
        tx.sender_public_key = Some("02ab".into());
        assert_eq!(String::from_utf8(tx.signing_payload()).unwrap(), payload);
    }

    #[test]
    fn reward_has_no_credentials() {
        let tx = Transaction::reward("miner", 1.0);
        assert!(tx.is_reward());
        let json = tx.canonical_json();
        assert!(!json.contains("signature"));
        assert!(!json.contains("sender_public_key"));
    }

    #[test]
    fn signed_transaction_verifies() {
        let wallet = Wallet::generate(Network::Mainnet);
        let tx = wallet.create_transaction("bob", 0.5).unwrap();
        assert_eq!(tx.verify_signature(Network::Mainnet), Ok(()));
    }

    #[test]
    fn tampering_is_detected() {
        let wallet = Wallet::generate(Network::Mainnet);
        let mut tx = wallet.create_transaction("bob", 0.5).unwrap();
        tx.value = 50.0;
        assert_eq!(
            tx.verify_signature(Network::Mainnet),
            Err(TransactionError::InvalidSignature)
        );
    }

    #[test]
    fn high_s_copy_is_rejected() {
        let wallet = Wallet::generate(Network::Mainnet);
        let tx = wallet.create_transaction("bob", 0.5).unwrap();
        let mut mirrored = tx.clone();
        let sig = tx.signature.clone().unwrap();
        mirrored.signature = Some(Signature {
            r: sig.r,
            s: &*N - &sig.s,
        });
        assert_ne!(mirrored.canonical_json(), tx.canonical_json());
        assert_eq!(
            mirrored.verify_signature(Network::Mainnet),
            Err(TransactionError::InvalidSignature)
        );
    }

    #[test]
    fn key_must_own_sender_address() {
        let alice = Wallet::generate(Network::Mainnet);
        let mallory = Wallet::generate(Network::Mainnet);
        let mut tx = mallory.create_transaction("mallory", 1.0).unwrap();
        tx.sender_blockchain_address = alice.address().to_string();
        assert_eq!(
            tx.verify_signature(Network::Mainnet),
            Err(TransactionError::AddressMismatch)
        );
    }

    #[test]
    fn missing_or_malformed_credentials() {
        let tx = Transaction::new("alice", "bob", 1.0);
        assert_eq!(
            tx.verify_signature(Network::Mainnet),
            Err(TransactionError::MissingCredentials)
        );

        let wallet = Wallet::generate(Network::Mainnet);
        let mut tx = wallet.create_transaction("bob", 1.0).unwrap();
        tx.sender_public_key = Some("zz".into());
        assert!(matches!(
            tx.verify_signature(Network::Mainnet),
            Err(TransactionError::MalformedKey(_))
        ));
    }

    #[test]
    fn serde_round_trip_keeps_canonical_form() {
        let wallet = Wallet::generate(Network::Testnet);
        let tx = wallet.create_transaction("bob", 0.25).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.canonical_json(), tx.canonical_json());
        assert_eq!(back.verify_signature(Network::Testnet), Ok(()));
    }
}
