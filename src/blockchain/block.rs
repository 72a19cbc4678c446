use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::{Transaction, now_timestamp};

/// Deterministic JSON: object keys sorted, no whitespace.
///
/// Going through `serde_json::Value` sorts keys regardless of struct field
/// order, since its map is a `BTreeMap`.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_value(value)
        .expect("serialize canonical json")
        .to_string()
}

/// Hex SHA-256 of a string.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of the canonical encoding of `value`.
pub fn hash_json<T: Serialize + ?Sized>(value: &T) -> String {
    sha256_hex(&canonical_json(value))
}

/// A sealed block. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub previous_hash: String,
    /// Leading hex zeros the block was mined at. Zero for genesis.
    #[serde(default)]
    pub difficulty: u32,
}

impl Block {
    /// Create the genesis block: no transactions, nonce 0, parent hash of `{}`.
    pub fn genesis() -> Self {
        Self {
            timestamp: now_timestamp(),
            transactions: Vec::new(),
            nonce: 0,
            previous_hash: hash_json(&serde_json::json!({})),
            difficulty: 0,
        }
    }

    pub fn new(
        transactions: Vec<Transaction>,
        nonce: u64,
        previous_hash: String,
        difficulty: u32,
    ) -> Self {
        Self {
            timestamp: now_timestamp(),
            transactions,
            nonce,
            previous_hash,
            difficulty,
        }
    }

    /// SHA-256 over the whole block's canonical encoding. This is what the
    /// next block's `previous_hash` must equal.
    pub fn hash(&self) -> String {
        hash_json(self)
    }

    /// True if any transaction here is byte-for-byte equal to `tx`.
    pub fn contains(&self, tx: &Transaction) -> bool {
        let needle = tx.canonical_json();
        self.transactions
            .iter()
            .any(|t| t.canonical_json() == needle)
    }
}
