use std::collections::HashSet;

use super::model::Transaction;

/// Pending transactions, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    pending: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    /// Byte-for-byte membership on the canonical encoding.
    pub fn contains(&self, tx: &Transaction) -> bool {
        let needle = tx.canonical_json();
        self.pending.iter().any(|t| t.canonical_json() == needle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.pending.iter()
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    /// Drop every entry whose canonical encoding is in `confirmed`.
    /// Returns how many were removed.
    pub fn prune(&mut self, confirmed: &HashSet<String>) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|t| !confirmed.contains(&t.canonical_json()));
        before - self.pending.len()
    }

    /// Remove exactly the given transactions, leaving later arrivals.
    pub fn remove_all(&mut self, included: &[Transaction]) -> usize {
        let included: HashSet<String> = included.iter().map(Transaction::canonical_json).collect();
        self.prune(&included)
    }

    /// Remove one transaction. Returns whether it was pending.
    pub fn withdraw(&mut self, tx: &Transaction) -> bool {
        let needle = tx.canonical_json();
        match self.pending.iter().position(|t| t.canonical_json() == needle) {
            Some(idx) => {
                self.pending.remove(idx);
                true
            }
            None => false,
        }
    }
}
