pub mod scheduler;

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::Semaphore;

use crate::blockchain::{Block, Blockchain, Resolution, proof_of_work};
use crate::config::NodeConfig;
use crate::error::{MessageError, MiningError};
use crate::p2p::message::{KeyInfo, Message, MessageType, NodeRole, Outgoing, decode_payload};
use crate::p2p::peers::PeerList;
use crate::p2p::transport::{Transport, deliver};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// A core node: one chain and pool behind a lock, the miner's wallet, and
/// the two peer lists.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    blockchain: Mutex<Blockchain>,
    wallet: Wallet,
    core_nodes: PeerList,
    edge_nodes: PeerList,
    mining_gate: Semaphore,
    sync_gate: Semaphore,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let wallet = Wallet::generate(config.consensus.network);
        Self::with_wallet(config, wallet)
    }

    pub fn with_wallet(config: NodeConfig, wallet: Wallet) -> Self {
        let core_nodes = PeerList::new("core");
        core_nodes.overwrite(
            config
                .core_peers
                .iter()
                .filter(|p| **p != config.public_addr)
                .cloned(),
        );
        Self {
            blockchain: Mutex::new(Blockchain::new(config.consensus.clone())),
            wallet,
            core_nodes,
            edge_nodes: PeerList::new("edge"),
            mining_gate: Semaphore::new(1),
            sync_gate: Semaphore::new(1),
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn public_addr(&self) -> &str {
        &self.config.public_addr
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn core_nodes(&self) -> &PeerList {
        &self.core_nodes
    }

    pub fn edge_nodes(&self) -> &PeerList {
        &self.edge_nodes
    }

    /// Lock the chain and pool. Keep the guard short.
    pub fn blockchain(&self) -> MutexGuard<'_, Blockchain> {
        self.blockchain.lock().expect("mutex poisoned")
    }

    pub fn key_info(&self) -> KeyInfo {
        KeyInfo {
            public_key: self.wallet.public_key_hex(),
            blockchain_address: self.wallet.address().to_string(),
        }
    }

    fn message(&self, msg_type: MessageType) -> Message {
        Message::new(msg_type, self.public_addr(), NodeRole::Core, None)
    }

    fn message_with<T: serde::Serialize + ?Sized>(&self, msg_type: MessageType, body: &T) -> Message {
        Message::with_body(msg_type, self.public_addr(), NodeRole::Core, body)
    }

    /// `rsp_full_chain` carrying the current chain.
    pub fn chain_message(&self) -> Message {
        let bc = self.blockchain();
        self.message_with(MessageType::RspFullChain, &bc.chain)
    }

    /// Entry point for a message from the wire: check the envelope, remember
    /// the sender under its declared role, then handle it.
    pub fn receive(&self, msg: Message) -> Result<Vec<Outgoing>, MessageError> {
        msg.check_protocol()?;
        let is_from_core = msg.role == NodeRole::Core;
        if msg.sender != self.config.public_addr {
            match msg.role {
                NodeRole::Core => self.core_nodes.add(&msg.sender),
                NodeRole::Edge => self.edge_nodes.add(&msg.sender),
            };
        }
        self.handle_incoming_message(msg.msg_type, msg.payload.as_deref(), is_from_core)
    }

    /// React to one peer message and return what should be sent in turn.
    pub fn handle_incoming_message(
        &self,
        msg_type: MessageType,
        payload: Option<&str>,
        is_from_core: bool,
    ) -> Result<Vec<Outgoing>, MessageError> {
        debug!(
            "P2P - handling {} (from_core={})",
            msg_type.as_str(),
            is_from_core
        );
        match msg_type {
            MessageType::RequestFullChain => Ok(vec![Outgoing::Reply(self.chain_message())]),

            MessageType::RequestKeyInfo => Ok(vec![Outgoing::Reply(
                self.message_with(MessageType::KeyInfo, &self.key_info()),
            )]),

            MessageType::DeleteTransaction => {
                self.blockchain().renew_transaction_pool();
                Ok(Vec::new())
            }

            MessageType::NewTransaction => {
                let tx: Transaction = decode_payload(msg_type, payload)?;
                let mut bc = self.blockchain();
                if bc.pool().contains(&tx) {
                    debug!("P2P - transaction already pooled");
                    return Ok(Vec::new());
                }
                match bc.add_transaction(tx.clone()) {
                    Ok(()) if !is_from_core => Ok(vec![Outgoing::Broadcast(
                        self.message_with(MessageType::NewTransaction, &tx),
                    )]),
                    Ok(()) => Ok(Vec::new()),
                    Err(_) => Ok(Vec::new()),
                }
            }

            MessageType::RspFullChain => {
                if !is_from_core {
                    debug!("P2P - ignoring chain from edge node");
                    return Ok(Vec::new());
                }
                let chain: Vec<Block> = decode_payload(msg_type, payload)?;
                if let Resolution::Replaced { requeued } = self.blockchain().resolve_conflicts(chain)
                {
                    debug!("P2P - chain adopted, {} orphans requeued", requeued);
                }
                Ok(Vec::new())
            }

            MessageType::NewBlock => {
                let block: Block = decode_payload(msg_type, payload)?;
                match self.blockchain().accept_block(block) {
                    Ok(()) => Ok(Vec::new()),
                    Err(e) if is_from_core => {
                        debug!("P2P - block not appended ({}), asking for full chain", e);
                        Ok(vec![Outgoing::Reply(
                            self.message(MessageType::RequestFullChain),
                        )])
                    }
                    Err(e) => {
                        warn!("P2P - block from edge node rejected: {}", e);
                        Ok(Vec::new())
                    }
                }
            }

            MessageType::KeyInfo => {
                let info: KeyInfo = decode_payload(msg_type, payload)?;
                info!("P2P - key info for {}", info.blockchain_address);
                Ok(Vec::new())
            }

            MessageType::CoreList => {
                if !is_from_core {
                    return Ok(Vec::new());
                }
                let peers: Vec<String> = decode_payload(msg_type, payload)?;
                self.core_nodes
                    .overwrite(peers.into_iter().filter(|p| *p != self.config.public_addr));
                Ok(Vec::new())
            }
        }
    }

    /// One mining round: pay ourselves, search a nonce off the lock, seal
    /// exactly what was searched, retune difficulty. Not gated; see
    /// [`Node::start_mining`].
    async fn mine_once(&self) -> Result<Vec<Outgoing>, MiningError> {
        let started = Instant::now();

        let (reward, transactions, previous_hash, difficulty, timeout) = {
            let mut bc = self.blockchain();
            bc.renew_transaction_pool();
            let reward = bc
                .add_reward(self.wallet.address(), self.config.consensus.mining_reward)
                .inspect_err(|e| warn!("MINER - reward not queued: {}", e))
                .ok();
            (
                reward,
                bc.pool().snapshot(),
                bc.last_hash(),
                bc.difficulty(),
                bc.params().pow_timeout,
            )
        };
        debug!(
            "MINER - searching difficulty={} txs={}",
            difficulty,
            transactions.len()
        );

        let search_txs = transactions.clone();
        let search_prev = previous_hash.clone();
        let found = tokio::task::spawn_blocking(move || {
            proof_of_work(&search_txs, &search_prev, difficulty, timeout)
        })
        .await
        .map_err(|e| MiningError::Worker(e.to_string()))?;

        let mut bc = self.blockchain();
        let nonce = match found {
            Ok(nonce) => nonce,
            Err(e) => {
                bc.record_pow_timeout();
                if let Some(reward) = &reward {
                    bc.withdraw(reward);
                }
                return Err(e.into());
            }
        };
        if let Err(e) = bc.seal_block(transactions, nonce, &previous_hash) {
            warn!("MINER - block not sealed: {}", e);
            if let Some(reward) = &reward {
                bc.withdraw(reward);
            }
            return Err(e.into());
        }

        let elapsed = (started.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0;
        bc.difficulty_adjustment(elapsed);
        let chain = self.message_with(MessageType::RspFullChain, &bc.chain);
        drop(bc);

        Ok(vec![
            Outgoing::Broadcast(self.message(MessageType::DeleteTransaction)),
            Outgoing::Broadcast(chain),
        ])
    }

    /// Mine once if no other round is running, then tell the core nodes.
    /// A concurrent call returns [`MiningError::Busy`] without waiting.
    pub async fn start_mining<T: Transport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<usize, MiningError> {
        let _permit = self
            .mining_gate
            .try_acquire()
            .map_err(|_| MiningError::Busy)?;
        let outgoing = self.mine_once().await?;
        Ok(deliver(self, transport, outgoing).await)
    }

    /// Share our core list and ask every core node for its chain. Returns
    /// `None` if a sync is already running.
    pub async fn sync_peers<T: Transport + ?Sized>(&self, transport: &T) -> Option<usize> {
        let _permit = self.sync_gate.try_acquire().ok()?;
        if self.core_nodes.is_empty() {
            self.core_nodes.overwrite(
                self.config
                    .core_peers
                    .iter()
                    .filter(|p| **p != self.config.public_addr)
                    .cloned(),
            );
        }
        let mut peers = self.core_nodes.snapshot();
        peers.push(self.config.public_addr.clone());
        let outgoing = vec![
            Outgoing::Broadcast(self.message_with(MessageType::CoreList, &peers)),
            Outgoing::Broadcast(self.message(MessageType::RequestFullChain)),
        ];
        Some(deliver(self, transport, outgoing).await)
    }

    /// Ask every core node for its chain and resolve against the replies.
    pub async fn pull_chains<T: Transport + ?Sized>(&self, transport: &T) -> usize {
        let outgoing = vec![Outgoing::Broadcast(
            self.message(MessageType::RequestFullChain),
        )];
        deliver(self, transport, outgoing).await
    }

    pub fn next_mining_delay(&self) -> Duration {
        self.blockchain().next_mining_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusParams;
    use crate::crypto::Network;
    use crate::p2p::transport::loopback::Loopback;
    use std::sync::Arc;

    pub(crate) fn test_config(addr: &str, peers: &[&str]) -> NodeConfig {
        NodeConfig {
            public_addr: addr.to_string(),
            core_peers: peers.iter().map(|p| p.to_string()).collect(),
            consensus: ConsensusParams {
                baseline_difficulty: 1,
                pow_timeout: Duration::from_secs(30),
                ..ConsensusParams::default()
            },
            ..NodeConfig::default()
        }
    }

    fn node(addr: &str, peers: &[&str]) -> Arc<Node> {
        Arc::new(Node::new(test_config(addr, peers)))
    }

    fn from(sender: &str, role: NodeRole, msg_type: MessageType, payload: Option<String>) -> Message {
        Message::new(msg_type, sender, role, payload)
    }

    #[test]
    fn request_full_chain_replies_with_chain() {
        let n = node("a:1", &[]);
        let out = n
            .receive(from("b:2", NodeRole::Core, MessageType::RequestFullChain, None))
            .unwrap();
        let [Outgoing::Reply(reply)] = out.as_slice() else {
            panic!("expected one reply, got {out:?}");
        };
        assert_eq!(reply.msg_type, MessageType::RspFullChain);
        let chain: Vec<Block> = serde_json::from_str(reply.payload.as_deref().unwrap()).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(n.core_nodes().contains("b:2"));
    }

    #[test]
    fn key_info_never_carries_private_key() {
        let n = node("a:1", &[]);
        let out = n
            .receive(from("w:9", NodeRole::Edge, MessageType::RequestKeyInfo, None))
            .unwrap();
        let [Outgoing::Reply(reply)] = out.as_slice() else {
            panic!("expected one reply");
        };
        let payload = reply.payload.as_deref().unwrap();
        assert!(!payload.contains(&n.wallet().private_key_hex()));
        let info: KeyInfo = serde_json::from_str(payload).unwrap();
        assert_eq!(info.blockchain_address, n.wallet().address());
        assert!(n.edge_nodes().contains("w:9"));
    }

    #[test]
    fn new_transaction_from_edge_is_rebroadcast_once() {
        let n = node("a:1", &[]);
        let w = Wallet::generate(Network::Mainnet);
        let tx = w.create_transaction("bob", 0.0).unwrap();
        let payload = Some(serde_json::to_string(&tx).unwrap());

        let out = n
            .receive(from("w:9", NodeRole::Edge, MessageType::NewTransaction, payload.clone()))
            .unwrap();
        assert!(matches!(out.as_slice(), [Outgoing::Broadcast(m)] if m.msg_type == MessageType::NewTransaction));
        assert_eq!(n.blockchain().pool().len(), 1);

        let out = n
            .receive(from("w:9", NodeRole::Edge, MessageType::NewTransaction, payload))
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(n.blockchain().pool().len(), 1);
    }

    #[test]
    fn new_transaction_from_core_is_not_rebroadcast() {
        let n = node("a:1", &[]);
        let w = Wallet::generate(Network::Mainnet);
        let tx = w.create_transaction("bob", 0.0).unwrap();
        let out = n
            .receive(from(
                "b:2",
                NodeRole::Core,
                MessageType::NewTransaction,
                Some(serde_json::to_string(&tx).unwrap()),
            ))
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(n.blockchain().pool().len(), 1);
    }

    #[test]
    fn missing_or_garbled_payload_is_an_error() {
        let n = node("a:1", &[]);
        assert!(matches!(
            n.handle_incoming_message(MessageType::NewTransaction, None, false),
            Err(MessageError::MissingPayload("new_transaction"))
        ));
        assert!(matches!(
            n.handle_incoming_message(MessageType::RspFullChain, Some("[{"), true),
            Err(MessageError::Payload(_))
        ));
    }

    #[test]
    fn full_chain_only_counts_from_core_nodes() {
        let local = node("a:1", &[]);
        let remote = node("b:2", &[]);
        {
            let mut bc = remote.blockchain();
            bc.add_reward("m", 1.0).unwrap();
            let nonce = bc.proof_of_work().unwrap();
            let prev = bc.last_hash();
            bc.create_block(nonce, &prev).unwrap();
        }
        let chain = remote.chain_message();

        let mut from_edge = chain.clone();
        from_edge.role = NodeRole::Edge;
        local.receive(from_edge).unwrap();
        assert_eq!(local.blockchain().len(), 1);

        local.receive(chain).unwrap();
        assert_eq!(local.blockchain().len(), 2);
    }

    #[test]
    fn unknown_block_asks_core_sender_for_chain() {
        let local = node("a:1", &[]);
        let block = Block::new(Vec::new(), 0, "elsewhere".into(), 1);
        let payload = Some(serde_json::to_string(&block).unwrap());

        let out = local
            .handle_incoming_message(MessageType::NewBlock, payload.as_deref(), true)
            .unwrap();
        assert!(matches!(out.as_slice(), [Outgoing::Reply(m)] if m.msg_type == MessageType::RequestFullChain));

        let out = local
            .handle_incoming_message(MessageType::NewBlock, payload.as_deref(), false)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn core_list_overwrites_and_excludes_self() {
        let n = node("a:1", &["old:1"]);
        assert!(n.core_nodes().contains("old:1"));
        let msg = Message::with_body(MessageType::CoreList, "b:2", NodeRole::Core, &["a:1", "c:3"]);
        n.receive(msg).unwrap();
        assert_eq!(n.core_nodes().snapshot(), vec!["c:3".to_string()]);
    }

    #[test]
    fn delete_transaction_prunes_confirmed() {
        let n = node("a:1", &[]);
        let w = Wallet::generate(Network::Mainnet);
        let spend = w.create_transaction("bob", 0.0).unwrap();
        n.blockchain().add_transaction(spend.clone()).unwrap();
        n.blockchain().add_reward("next", 1.0).unwrap();

        // A peer confirms the pending transfer and its chain is adopted.
        let mut remote = Blockchain::new(n.config().consensus.clone());
        remote.add_transaction(spend).unwrap();
        let nonce = remote.proof_of_work().unwrap();
        let prev = remote.last_hash();
        remote.create_block(nonce, &prev).unwrap();
        n.blockchain().chain = remote.chain.clone();

        n.handle_incoming_message(MessageType::DeleteTransaction, None, true)
            .unwrap();
        assert_eq!(n.blockchain().pool().len(), 1);
        assert!(n.blockchain().pool().iter().all(Transaction::is_reward));
    }

    #[tokio::test]
    async fn forged_mining_reward_from_a_peer_is_dropped() {
        let n = node("a:1", &[]);
        let forged = Transaction::reward("attacker", 1e6);
        let out = n
            .receive(from(
                "w:9",
                NodeRole::Edge,
                MessageType::NewTransaction,
                Some(serde_json::to_string(&forged).unwrap()),
            ))
            .unwrap();
        assert!(out.is_empty());
        assert!(n.blockchain().pool().is_empty());

        n.start_mining(&Loopback::default()).await.unwrap();
        assert_eq!(n.blockchain().calculate_total_amount("attacker"), 0.0);
    }

    #[tokio::test]
    async fn mining_never_replays_a_confirmed_transfer() {
        let n = node("a:1", &[]);
        let transport = Loopback::default();
        let w = n.wallet().clone();
        n.start_mining(&transport).await.unwrap();

        let spend = w.create_transaction("bob", 0.5).unwrap();
        n.blockchain().add_transaction(spend.clone()).unwrap();
        n.start_mining(&transport).await.unwrap();
        assert_eq!(n.blockchain().calculate_total_amount("bob"), 0.5);

        let payload = Some(serde_json::to_string(&spend).unwrap());
        let out = n
            .receive(from("w:9", NodeRole::Edge, MessageType::NewTransaction, payload))
            .unwrap();
        assert!(out.is_empty());
        n.start_mining(&transport).await.unwrap();

        let bc = n.blockchain();
        assert_eq!(bc.len(), 4);
        assert_eq!(bc.calculate_total_amount("bob"), 0.5);
        assert_eq!(bc.calculate_total_amount(w.address()), 2.5);
        assert!(bc.is_valid());
    }

    #[tokio::test]
    async fn mining_pays_the_node_wallet_and_informs_peers() {
        let a = node("a:1", &["b:2"]);
        let b = node("b:2", &[]);
        let transport = Loopback::with(&[&a, &b]);

        let sent = a.start_mining(&transport).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(a.blockchain().len(), 2);
        assert!(a.blockchain().pool().is_empty());
        assert_eq!(
            a.blockchain().calculate_total_amount(a.wallet().address()),
            1.0
        );
        assert_eq!(b.blockchain().chain, a.blockchain().chain);
        assert!(b.core_nodes().contains("a:1"));
    }

    #[tokio::test]
    async fn concurrent_mining_is_a_no_op() {
        let a = node("a:1", &[]);
        let transport = Loopback::default();
        let _held = a.mining_gate.try_acquire().unwrap();
        assert!(matches!(
            a.start_mining(&transport).await,
            Err(MiningError::Busy)
        ));
        assert_eq!(a.blockchain().len(), 1);
        assert!(a.blockchain().pool().is_empty());
    }

    #[tokio::test]
    async fn mining_timeout_withdraws_reward_and_lowers_difficulty() {
        let mut config = test_config("a:1", &[]);
        config.consensus.baseline_difficulty = 64;
        config.consensus.pow_timeout = Duration::from_millis(10);
        let a = Node::new(config);

        let result = a.start_mining(&Loopback::default()).await;
        assert!(matches!(result, Err(MiningError::Pow(_))));
        assert!(a.blockchain().pool().is_empty());
        assert_eq!(a.blockchain().difficulty(), 63);
    }

    #[tokio::test]
    async fn sync_adopts_longer_peer_chain() {
        let a = node("a:1", &["b:2"]);
        let b = node("b:2", &[]);
        let transport = Loopback::with(&[&a, &b]);
        b.start_mining(&transport).await.unwrap();
        b.start_mining(&transport).await.unwrap();

        assert_eq!(a.sync_peers(&transport).await, Some(2));
        assert_eq!(a.blockchain().len(), 3);
        assert_eq!(b.core_nodes().snapshot(), vec!["a:1".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_peer_is_dropped() {
        let a = node("a:1", &["gone:1"]);
        let sent = a.pull_chains(&Loopback::with(&[&a])).await;
        assert_eq!(sent, 0);
        assert!(a.core_nodes().is_empty());
    }
}
