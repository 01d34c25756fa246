use crate::core::Transaction;
use std::collections::HashSet;

/// Pending transactions in admission order. The next block includes them in exactly
/// this order; there is no fee-based reordering.
///
/// The pool has no lock of its own: it lives inside the ledger and is guarded
/// by the ledger's lock together with the chain.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    inner: Vec<Transaction>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.inner.iter().any(|tx| tx.get_id() == txid)
    }

    pub fn add(&mut self, tx: Transaction) {
        self.inner.push(tx);
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.inner.iter().find(|tx| tx.get_id() == txid)
    }

    /// Value plus fee this address has already committed in pending transactions
    pub fn pending_outflow(&self, address: &str) -> f64 {
        self.inner
            .iter()
            .filter(|tx| tx.get_sender_address() == address)
            .map(|tx| tx.get_value() + tx.get_fee())
            .sum()
    }

    pub fn total_fees(&self) -> f64 {
        self.inner.iter().map(Transaction::get_fee).sum()
    }

    /// Empties the pool, handing back everything in admission order.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.inner)
    }

    /// Drops every pending transaction whose id is in `ids` (they made it on chain).
    /// Returns how many were removed.
    pub fn remove_included(&mut self, ids: &HashSet<&str>) -> usize {
        let before = self.inner.len();
        self.inner.retain(|tx| !ids.contains(tx.get_id()));
        before - self.inner.len()
    }

    pub fn get_all(&self) -> &[Transaction] {
        self.inner.as_slice()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{new_key_pair, KeyMaterial};

    fn transfer(sender: &KeyMaterial, value: f64, fee: f64) -> Transaction {
        let recipient = KeyMaterial::Private(new_key_pair().unwrap());
        let mut tx = Transaction::new(sender, &recipient, value, fee).unwrap();
        tx.sign(sender).unwrap();
        tx
    }

    #[test]
    fn test_fifo_order_preserved() {
        let sender = KeyMaterial::Private(new_key_pair().unwrap());
        let mut pool = MemoryPool::new();
        let txs: Vec<_> = (1..=3).map(|i| transfer(&sender, i as f64, 0.0)).collect();
        for tx in &txs {
            pool.add(tx.clone());
        }

        let taken = pool.take_all();
        assert_eq!(taken, txs);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pending_outflow_and_fees() {
        let alice = KeyMaterial::Private(new_key_pair().unwrap());
        let bob = KeyMaterial::Private(new_key_pair().unwrap());
        let mut pool = MemoryPool::new();
        pool.add(transfer(&alice, 90.0, 1.0));
        pool.add(transfer(&alice, 5.0, 0.5));
        pool.add(transfer(&bob, 3.0, 0.25));

        let alice_addr = alice.address().unwrap();
        assert_eq!(pool.pending_outflow(&alice_addr), 96.5);
        assert_eq!(pool.total_fees(), 1.75);
        assert_eq!(pool.pending_outflow("nobody"), 0.0);
    }

    #[test]
    fn test_remove_included() {
        let sender = KeyMaterial::Private(new_key_pair().unwrap());
        let mut pool = MemoryPool::new();
        let first = transfer(&sender, 1.0, 0.0);
        let second = transfer(&sender, 2.0, 0.0);
        pool.add(first.clone());
        pool.add(second.clone());

        let ids: HashSet<&str> = [first.get_id()].into_iter().collect();
        assert_eq!(pool.remove_included(&ids), 1);
        assert!(!pool.contains(first.get_id()));
        assert!(pool.contains(second.get_id()));
        assert_eq!(pool.get(second.get_id()), Some(&second));
    }
}
