//! Proof-of-work chain node with hand-rolled secp256k1.
//!
//! Layers, bottom up: `crypto` (field, curve, keys), `transaction` and
//! `wallet`, `blockchain` (ledger, proof of work, consensus), `p2p` and
//! `node` (message handling and scheduling), and the `api` HTTP surface.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod node;
pub mod p2p;
pub mod transaction;
pub mod wallet;
