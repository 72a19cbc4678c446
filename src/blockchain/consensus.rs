use std::collections::HashSet;

use log::{debug, info, warn};

use super::pow::valid_proof;
use super::{Block, Blockchain};
use crate::error::BlockError;
use crate::transaction::Transaction;

/// Outcome of offering a peer's chain to [`Blockchain::resolve_conflicts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Local chain swapped out. `requeued` local transactions that the new
    /// chain lacks went back into the pool.
    Replaced { requeued: usize },
    NotReplaced,
}

/// Hash linkage from index 1, plus proof of work for every block at or past
/// `proof_check_from`. Checked blocks must record a difficulty of at least 1.
pub fn valid_chain(chain: &[Block], proof_check_from: usize) -> bool {
    if chain.is_empty() {
        return false;
    }
    for (index, pair) in chain.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let index = index + 1;
        if block.previous_hash != prev.hash() {
            debug!("CONSENSUS - hash conflict at block #{}", index);
            return false;
        }
        if index >= proof_check_from
            && (block.difficulty == 0
                || !valid_proof(
                    &block.transactions,
                    &block.previous_hash,
                    block.nonce,
                    block.difficulty,
                ))
        {
            debug!("CONSENSUS - proof conflict at block #{}", index);
            return false;
        }
    }
    true
}

/// Canonical encodings of every transaction in non-genesis blocks.
fn confirmed_set(chain: &[Block]) -> HashSet<String> {
    chain
        .iter()
        .skip(1)
        .flat_map(|b| b.transactions.iter())
        .map(Transaction::canonical_json)
        .collect()
}

impl Blockchain {
    /// Validate a chain under this node's proof-check policy.
    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        valid_chain(chain, self.params.proof_check_from)
    }

    /// Validate the local chain.
    pub fn is_valid(&self) -> bool {
        self.valid_chain(&self.chain)
    }

    /// Adopt `candidate` iff it is strictly longer and valid. Local
    /// transfers missing from it are re-admitted against the new history;
    /// mining rewards are not.
    pub fn resolve_conflicts(&mut self, candidate: Vec<Block>) -> Resolution {
        if candidate.len() <= self.chain.len() || !self.valid_chain(&candidate) {
            info!(
                "CONSENSUS - not replaced (local={}, candidate={})",
                self.chain.len(),
                candidate.len()
            );
            return Resolution::NotReplaced;
        }

        let incoming = confirmed_set(&candidate);
        let orphaned: Vec<Transaction> = self
            .chain
            .iter()
            .skip(1)
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !tx.is_reward() && !incoming.contains(&tx.canonical_json()))
            .cloned()
            .collect();

        let old_len = self.chain.len();
        self.chain = candidate;
        info!(
            "CONSENSUS - replaced chain {} -> {} blocks, tip={}",
            old_len,
            self.chain.len(),
            self.last_hash()
        );

        let mut requeued = 0;
        for tx in orphaned {
            match self.add_transaction(tx) {
                Ok(()) => requeued += 1,
                Err(e) => debug!("CONSENSUS - dropped orphan: {}", e),
            }
        }
        self.renew_transaction_pool();
        Resolution::Replaced { requeued }
    }

    /// Whether `tx` is already recorded in a non-genesis block.
    pub fn is_confirmed(&self, tx: &Transaction) -> bool {
        let needle = tx.canonical_json();
        self.chain
            .iter()
            .skip(1)
            .flat_map(|b| b.transactions.iter())
            .any(|t| t.canonical_json() == needle)
    }

    /// Drop pool entries already recorded in a non-genesis block.
    pub fn renew_transaction_pool(&mut self) -> usize {
        let before = self.pool.len();
        let removed = self.pool.prune(&confirmed_set(&self.chain));
        debug!(
            "POOL - renewed: {} -> {} (removed {})",
            before,
            self.pool.len(),
            removed
        );
        removed
    }

    /// Reject a block carrying any transaction already in the chain.
    pub fn block_check(&self, block: &Block) -> Result<(), BlockError> {
        let confirmed = confirmed_set(&self.chain);
        if block
            .transactions
            .iter()
            .any(|tx| confirmed.contains(&tx.canonical_json()))
        {
            return Err(BlockError::DuplicateTransaction);
        }
        Ok(())
    }

    /// Append a block received from a peer if it extends the tip with a
    /// valid proof at its recorded difficulty.
    pub fn accept_block(&mut self, block: Block) -> Result<(), BlockError> {
        self.block_check(&block)?;
        if block.previous_hash != self.last_hash() {
            return Err(BlockError::StaleParent {
                previous_hash: block.previous_hash,
            });
        }
        if block.difficulty == 0
            || !valid_proof(
                &block.transactions,
                &block.previous_hash,
                block.nonce,
                block.difficulty,
            )
        {
            warn!("CONSENSUS - rejected block with invalid proof");
            return Err(BlockError::InvalidProof {
                difficulty: block.difficulty,
            });
        }

        self.pool.remove_all(&block.transactions);
        self.chain.push(block);
        info!("CONSENSUS - accepted peer block #{}", self.chain.len() - 1);
        Ok(())
    }
}
