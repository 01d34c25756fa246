//! Proof-of-stake production and verification
//!
//! A PoS block names its producer in `validator` and carries the producer's
//! signature over the block hash. Verification takes the public key from the
//! block's coinbase, so the producer must also be the coinbase recipient.

use std::collections::BTreeMap;

use rand::Rng;

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify, KeyMaterial};

/// Locked stake per address. Ordered by address so that selection walks
/// entries in ascending address order on every node.
#[derive(Debug, Clone, Default)]
pub struct StakeTable {
    stakes: BTreeMap<String, f64>,
}

impl StakeTable {
    pub fn new() -> StakeTable {
        StakeTable::default()
    }

    pub fn add_stake(&mut self, address: &str, amount: f64) {
        *self.stakes.entry(address.to_string()).or_insert(0.0) += amount;
    }

    pub fn get_stake(&self, address: &str) -> f64 {
        self.stakes.get(address).copied().unwrap_or(0.0)
    }

    pub fn total_stake(&self) -> f64 {
        self.stakes.values().sum()
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.stakes.iter().map(|(address, stake)| (address.as_str(), *stake))
    }

    pub fn select_validator(&self) -> Option<String> {
        self.select_validator_with(&mut rand::thread_rng())
    }

    /// Stake-weighted draw: pick `r` in `[0, total)` and return the first address
    /// whose running total reaches `r`.
    pub fn select_validator_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let total = self.total_stake();
        if self.stakes.is_empty() || total <= 0.0 {
            return None;
        }
        let draw = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        for (address, stake) in &self.stakes {
            cumulative += stake;
            if cumulative >= draw {
                return Some(address.clone());
            }
        }
        // float rounding can leave the draw a hair above the last running total
        self.stakes.keys().next_back().cloned()
    }
}

/// Marks `block` as produced by the owner of `private_key` and signs its hash.
pub fn sign_block(block: &mut Block, private_key: &KeyMaterial) -> Result<()> {
    let pkcs8 = match private_key {
        KeyMaterial::Private(pkcs8) => pkcs8,
        KeyMaterial::Public(_) => {
            return Err(BlockchainError::Crypto(
                "Block signing requires a private key".to_string(),
            ))
        }
    };
    let address = private_key.address()?;
    let signature = ecdsa_p256_sha256_sign(pkcs8, block.get_hash().as_bytes())?;
    block.set_validator(address, signature);
    Ok(())
}

/// Checks a PoS block's validator signature. The error string says why it failed.
pub fn verify_block(block: &Block) -> std::result::Result<(), String> {
    let validator = block
        .get_validator()
        .ok_or_else(|| "block has no validator".to_string())?;
    let signature = block
        .get_validator_signature()
        .ok_or_else(|| "validator signature missing".to_string())?;
    let coinbase = block
        .get_transactions()
        .first()
        .filter(|tx| tx.is_coinbase())
        .ok_or_else(|| "PoS block has no coinbase transaction".to_string())?;
    let key = coinbase
        .get_recipient()
        .ok_or_else(|| "coinbase carries no recipient key".to_string())?;

    let key_address = key.address().map_err(|e| e.to_string())?;
    if key_address != validator {
        return Err(format!(
            "validator {validator} is not the coinbase recipient {key_address}"
        ));
    }
    if !ecdsa_p256_sha256_verify(key.as_bytes(), signature, block.get_hash().as_bytes()) {
        return Err("validator signature does not verify".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::utils::new_key_pair;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pos_block(producer: &KeyMaterial, coinbase_to: &KeyMaterial) -> Block {
        let coinbase = Transaction::new_coinbase(coinbase_to, 45.0).unwrap();
        let mut block =
            Block::new_block(1, "abc".to_string(), vec![coinbase], 0.0, 50.0).unwrap();
        sign_block(&mut block, producer).unwrap();
        block
    }

    #[test]
    fn test_empty_table_selects_nobody() {
        let table = StakeTable::new();
        assert_eq!(table.select_validator(), None);
    }

    #[test]
    fn test_single_staker_always_selected() {
        let mut table = StakeTable::new();
        table.add_stake("alice", 10.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(
                table.select_validator_with(&mut rng).as_deref(),
                Some("alice")
            );
        }
    }

    #[test]
    fn test_stake_is_additive() {
        let mut table = StakeTable::new();
        table.add_stake("alice", 10.0);
        table.add_stake("alice", 5.0);
        table.add_stake("bob", 1.0);
        assert_eq!(table.get_stake("alice"), 15.0);
        assert_eq!(table.total_stake(), 16.0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_stake("carol"), 0.0);
    }

    #[test]
    fn test_selection_is_stake_weighted() {
        let mut table = StakeTable::new();
        table.add_stake("heavy", 90.0);
        table.add_stake("light", 10.0);
        let mut rng = StdRng::seed_from_u64(42);

        let heavy = (0..2000)
            .filter(|_| table.select_validator_with(&mut rng).as_deref() == Some("heavy"))
            .count();
        assert!(heavy > 1600 && heavy < 1990, "heavy picked {heavy} times");
    }

    #[test]
    fn test_same_seed_same_choice() {
        let mut table = StakeTable::new();
        table.add_stake("a", 1.0);
        table.add_stake("b", 1.0);
        table.add_stake("c", 1.0);
        let first = table.select_validator_with(&mut StdRng::seed_from_u64(9));
        let second = table.select_validator_with(&mut StdRng::seed_from_u64(9));
        assert_eq!(first, second);
    }

    #[test]
    fn test_signed_block_verifies() {
        let producer = KeyMaterial::Private(new_key_pair().unwrap());
        let block = pos_block(&producer, &producer);
        assert!(block.is_proof_of_stake());
        assert_eq!(
            block.get_validator(),
            Some(producer.address().unwrap().as_str())
        );
        assert!(verify_block(&block).is_ok());
    }

    #[test]
    fn test_validator_must_be_coinbase_recipient() {
        let producer = KeyMaterial::Private(new_key_pair().unwrap());
        let other = KeyMaterial::Private(new_key_pair().unwrap());
        let block = pos_block(&producer, &other);
        assert!(verify_block(&block).is_err());
    }

    #[test]
    fn test_signature_over_stale_hash_fails() {
        let producer = KeyMaterial::Private(new_key_pair().unwrap());
        let mut block = pos_block(&producer, &producer);
        let nonce = block.get_nonce();
        block.seal(nonce + 1, block.hash_with_nonce(nonce + 1));
        assert!(verify_block(&block).is_err());
    }
}
