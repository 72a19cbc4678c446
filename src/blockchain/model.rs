use log::{debug, info, warn};

use super::Block;
use super::pow::{self, DifficultyController};
use crate::config::ConsensusParams;
use crate::error::{BlockError, PowError, TransactionError};
use crate::transaction::{Transaction, TransactionPool};

/// In-memory chain, pending pool and difficulty state of one node.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub(super) pool: TransactionPool,
    pub(super) controller: DifficultyController,
    pub(super) params: ConsensusParams,
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            chain: vec![Block::genesis()],
            pool: TransactionPool::new(),
            controller: DifficultyController::new(params.clone()),
            params,
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Hash a new block must name as its parent.
    pub fn last_hash(&self) -> String {
        self.last_block().hash()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.controller.difficulty()
    }

    pub fn mining_speed(&self) -> f64 {
        self.controller.mining_speed()
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    /// Admit a transfer to the pool.
    ///
    /// Transfers need a finite, non-negative value, a low-s signature from
    /// the key owning the sender address, and enough confirmed balance. A
    /// transaction already pooled or already in the chain is declined, as is
    /// anything paid by the reserved mining sender; see
    /// [`Blockchain::add_reward`].
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        if tx.is_reward() {
            warn!("TX - declined: {} is reserved", tx.sender_blockchain_address);
            return Err(TransactionError::ReservedSender);
        }
        if !tx.value.is_finite() || tx.value < 0.0 {
            warn!(
                "TX - declined from {}: value {}",
                tx.sender_blockchain_address, tx.value
            );
            return Err(TransactionError::InvalidValue { value: tx.value });
        }
        self.check_fresh(&tx)?;

        if let Err(e) = tx.verify_signature(self.params.network) {
            warn!(
                "TX - declined from {}: {}",
                tx.sender_blockchain_address, e
            );
            return Err(e);
        }
        let balance = self.calculate_total_amount(&tx.sender_blockchain_address);
        if balance < tx.value {
            warn!(
                "TX - declined from {}: balance {} < value {}",
                tx.sender_blockchain_address, balance, tx.value
            );
            return Err(TransactionError::InsufficientBalance {
                balance,
                value: tx.value,
            });
        }

        info!(
            "TX - accepted {} -> {} value={}",
            tx.sender_blockchain_address, tx.recipient_blockchain_address, tx.value
        );
        self.pool.push(tx);
        debug!("TX - pool size={}", self.pool.len());
        Ok(())
    }

    /// Queue a mining reward for `recipient` and return it so the caller can
    /// withdraw it if the round fails.
    pub fn add_reward(
        &mut self,
        recipient: &str,
        value: f64,
    ) -> Result<Transaction, TransactionError> {
        let reward = Transaction::reward(recipient, value);
        self.check_fresh(&reward)?;
        debug!("MINER - reward {} queued for {}", value, recipient);
        self.pool.push(reward.clone());
        Ok(reward)
    }

    fn check_fresh(&self, tx: &Transaction) -> Result<(), TransactionError> {
        if self.pool.contains(tx) {
            return Err(TransactionError::Duplicate);
        }
        if self.is_confirmed(tx) {
            warn!(
                "TX - declined from {}: already confirmed",
                tx.sender_blockchain_address
            );
            return Err(TransactionError::AlreadyConfirmed);
        }
        Ok(())
    }

    /// Confirmed balance: received minus sent over every block. Starts at 0.
    pub fn calculate_total_amount(&self, address: &str) -> f64 {
        self.chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .fold(0.0, |total, tx| {
                let mut total = total;
                if tx.recipient_blockchain_address == address {
                    total += tx.value;
                }
                if tx.sender_blockchain_address == address {
                    total -= tx.value;
                }
                total
            })
    }

    /// Seal the whole current pool into a block.
    pub fn create_block(&mut self, nonce: u64, previous_hash: &str) -> Result<&Block, BlockError> {
        let transactions = self.pool.snapshot();
        self.seal_block(transactions, nonce, previous_hash)
    }

    /// Append a block built from exactly `transactions`, if it extends the
    /// tip, the nonce proves it at the current difficulty, and none of its
    /// transactions is already in the chain. The sealed transactions leave
    /// the pool; anything that arrived meanwhile stays. On failure nothing
    /// changes.
    pub fn seal_block(
        &mut self,
        transactions: Vec<Transaction>,
        nonce: u64,
        previous_hash: &str,
    ) -> Result<&Block, BlockError> {
        if previous_hash != self.last_hash() {
            return Err(BlockError::StaleParent {
                previous_hash: previous_hash.to_string(),
            });
        }
        let difficulty = self.difficulty();
        if !pow::valid_proof(&transactions, previous_hash, nonce, difficulty) {
            return Err(BlockError::InvalidProof { difficulty });
        }

        let block = Block::new(transactions, nonce, previous_hash.to_string(), difficulty);
        self.block_check(&block)?;
        let removed = self.pool.remove_all(&block.transactions);
        self.chain.push(block);
        info!(
            "MINER - sealed block #{} (nonce={}, difficulty={}, txs={})",
            self.chain.len() - 1,
            nonce,
            difficulty,
            removed
        );
        Ok(self.last_block())
    }

    /// Search a nonce for the current pool and tip while holding `self`.
    /// A timeout lowers difficulty.
    pub fn proof_of_work(&mut self) -> Result<u64, PowError> {
        let transactions = self.pool.snapshot();
        let previous_hash = self.last_hash();
        let result = pow::proof_of_work(
            &transactions,
            &previous_hash,
            self.difficulty(),
            self.params.pow_timeout,
        );
        if result.is_err() {
            self.record_pow_timeout();
        }
        result
    }

    /// Lower difficulty after a nonce search timed out.
    pub fn record_pow_timeout(&mut self) {
        let was = self.difficulty();
        self.controller.on_timeout();
        warn!(
            "POW - timed out at difficulty {}, now {}",
            was,
            self.difficulty()
        );
    }

    /// Retune difficulty from the duration of the last mining round.
    pub fn difficulty_adjustment(&mut self, elapsed_secs: f64) {
        self.controller.adjust(elapsed_secs, &mut rand::thread_rng());
    }

    /// Drop a pending transaction (e.g. an unused mining reward).
    pub fn withdraw(&mut self, tx: &Transaction) -> bool {
        self.pool.withdraw(tx)
    }

    /// Delay before the next scheduled mining attempt.
    pub fn next_mining_delay(&self) -> std::time::Duration {
        self.controller.next_delay(&mut rand::thread_rng())
    }
}
