use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::node::Node;
use crate::p2p::message::Outgoing;
use crate::p2p::transport::{HttpTransport, deliver};
use crate::transaction::Transaction;

/// Shared application state: the node and the transport it talks to peers with.
pub struct AppState {
    pub node: Arc<Node>,
    pub transport: Arc<HttpTransport>,
}

impl AppState {
    pub fn new(node: Arc<Node>, transport: Arc<HttpTransport>) -> Self {
        Self { node, transport }
    }

    /// Send peer messages in the background so the HTTP response is not held up.
    pub fn spawn_delivery(&self, outgoing: Vec<Outgoing>) {
        if outgoing.is_empty() {
            return;
        }
        let node = Arc::clone(&self.node);
        let transport = Arc::clone(&self.transport);
        actix_web::rt::spawn(async move {
            deliver(&node, transport.as_ref(), outgoing).await;
        });
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
    pub mining_speed: f64,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub length: usize,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub delivered: usize,
}

#[derive(Serialize)]
pub struct ConsensusResponse {
    pub replaced: bool,
    pub length: usize,
    pub delivered: usize,
}

/* ---------- TX API Models ---------- */

#[derive(Serialize)]
pub struct PoolResponse<'a> {
    pub size: usize,
    pub transactions: Vec<&'a Transaction>,
}

#[derive(Serialize)]
pub struct RenewResponse {
    pub removed: usize,
    pub size: usize,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub public_key: String,
    pub blockchain_address: String,
}

#[derive(Deserialize)]
pub struct SignTxRequest {
    pub sender_private_key: String,
    pub recipient_blockchain_address: String,
    pub value: f64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub mining_speed: f64,
    pub pool_size: usize,
    pub miner_address: String,
    pub core_nodes: Vec<String>,
    pub edge_nodes: Vec<String>,
}
