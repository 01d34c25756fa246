use crate::core::monetary::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use crate::core::{ProofOfWork, Transaction};
use crate::error::Result;
use crate::utils::keys::bytes_hex;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_hex};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    hash: String,
    nonce: u64,
    total_fees: f64,
    block_reward: f64,
    #[serde(default)]
    validator: Option<String>, // PoS producer address, None for PoW blocks
    #[serde(with = "bytes_hex", default)]
    validator_signature: Option<Vec<u8>>,
}

impl Block {
    /// Builds an unsealed block with nonce 0. It still needs either
    /// [`ProofOfWork::run`] or a validator signature before it is valid.
    pub fn new_block(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        total_fees: f64,
        block_reward: f64,
    ) -> Result<Block> {
        let timestamp = if index == 0 {
            GENESIS_TIMESTAMP
        } else {
            current_timestamp()?
        };
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            total_fees,
            block_reward,
            validator: None,
            validator_signature: None,
        };
        block.hash = block.calculate_hash();
        Ok(block)
    }

    /// Genesis is fully deterministic: fixed timestamp, no transactions, nonce search from 0.
    /// Nodes configured with the same difficulty always derive the same hash.
    pub fn generate_genesis_block(difficulty: usize) -> Block {
        let mut block = Block {
            index: 0,
            timestamp: GENESIS_TIMESTAMP,
            transactions: vec![],
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
            nonce: 0,
            total_fees: 0.0,
            block_reward: 0.0,
            validator: None,
            validator_signature: None,
        };
        ProofOfWork::new_proof_of_work(difficulty).run(&mut block);
        info!("Generated genesis block {}", block.hash);
        block
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        let mut data = format!("{}{}{}", self.index, self.previous_hash, self.timestamp);
        for tx in &self.transactions {
            data.push_str(tx.get_id());
        }
        data.push_str(&nonce.to_string());
        sha256_hex(&data)
    }

    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub(crate) fn set_validator(&mut self, address: String, signature: Vec<u8>) {
        self.validator = Some(address);
        self.validator_signature = Some(signature);
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.validator.is_some()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn get_block_reward(&self) -> f64 {
        self.block_reward
    }

    pub fn get_validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }

    pub fn get_validator_signature(&self) -> Option<&[u8]> {
        self.validator_signature.as_deref()
    }
}
