// This is the ledger - the chain, the mempool, the stake table and the validator allow-list
// in one place. It is the only thing that decides whether a transaction or block is accepted.
// Nothing in here locks: the node wraps the whole Blockchain in one RwLock so that every
// mutation (admission, mining, append, replacement, staking) runs under the same guard

use crate::config::{Config, NetworkConfig};
use crate::core::monetary::{self, fee_model, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use crate::core::proof_of_stake::{self, StakeTable};
use crate::core::{AccessControlManager, Block, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{ChainStore, MemoryChainStore, MemoryPool, SledChainStore};
use crate::utils::{current_timestamp, KeyMaterial};
use log::{debug, error, info, warn};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// Snapshot of the ledger for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStats {
    pub height: u64,
    pub current_supply: f64,
    pub treasury_balance: f64,
    pub mempool_size: usize,
    pub total_staked: f64,
    pub stakers: usize,
}

pub struct Blockchain {
    chain: Vec<Block>, // never empty, chain[0] is genesis
    mempool: MemoryPool,
    stakes: StakeTable,
    access_control: AccessControlManager,
    store: Box<dyn ChainStore>,
}

impl Blockchain {
    /// Loads the chain from `store`. Falls back to a freshly mined genesis block when
    /// the store is empty, unreadable, or holds a chain that does not validate.
    pub fn new(store: Box<dyn ChainStore>, access_control: AccessControlManager) -> Blockchain {
        let mut blockchain = Blockchain {
            chain: vec![],
            mempool: MemoryPool::new(),
            stakes: StakeTable::new(),
            access_control,
            store,
        };

        match blockchain.store.load() {
            Ok(Some(chain)) if !chain.is_empty() => match blockchain.validate_stored(&chain) {
                Ok(()) => {
                    info!("Restored chain at height {}", chain.len() - 1);
                    blockchain.chain = chain;
                }
                Err(e) => warn!("Stored chain is invalid ({e}), starting from genesis"),
            },
            Ok(_) => info!("No stored chain found, creating genesis block"),
            Err(e) => warn!("Failed to load stored chain ({e}), starting from genesis"),
        }

        if blockchain.chain.is_empty() {
            let genesis = Block::generate_genesis_block(blockchain.difficulty());
            blockchain.chain.push(genesis);
        }
        blockchain
    }

    /// Opens the node's sled database under `config.db_path()`
    pub fn open(config: &Config) -> Result<Blockchain> {
        let store = SledChainStore::open(config.db_path())?;
        let access_control = AccessControlManager::with_validators(
            config.network.clone(),
            config.allowed_validators.iter().cloned(),
        );
        Ok(Self::new(Box::new(store), access_control))
    }

    /// A ledger that keeps its chain in memory only
    pub fn in_memory(network: NetworkConfig) -> Blockchain {
        Self::new(
            Box::new(MemoryChainStore::new()),
            AccessControlManager::new(network),
        )
    }

    pub fn difficulty(&self) -> usize {
        self.access_control.get_network().difficulty
    }

    pub fn get_latest_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    pub fn get_genesis_block(&self) -> &Block {
        &self.chain[0]
    }

    pub fn get_chain(&self) -> &[Block] {
        self.chain.as_slice()
    }

    pub fn get_height(&self) -> u64 {
        self.get_latest_block().get_index()
    }

    pub fn get_mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn get_stakes(&self) -> &StakeTable {
        &self.stakes
    }

    pub fn get_access_control(&self) -> &AccessControlManager {
        &self.access_control
    }

    pub fn add_validator(&mut self, address: &str) {
        self.access_control.add_validator(address);
    }

    pub fn remove_validator(&mut self, address: &str) -> bool {
        self.access_control.remove_validator(address)
    }

    pub fn set_private_network(&mut self, private_network: bool) {
        self.access_control.set_private_network(private_network);
    }

    // ----- balances and supply -----

    /// Replays the whole chain for `address`: credits as recipient, debits (value + fee)
    /// as sender, minus whatever the address has staked. Never cached.
    pub fn get_balance(&self, address: &str) -> f64 {
        let mut balance = 0.0;
        for tx in self.chain.iter().flat_map(Block::get_transactions) {
            if tx.get_recipient_address() == address {
                balance += tx.get_value();
            }
            if tx.get_sender_address() == address {
                balance -= tx.get_value() + tx.get_fee();
            }
        }
        balance - self.stakes.get_stake(address)
    }

    pub fn get_treasury_balance(&self) -> f64 {
        self.get_balance(monetary::TREASURY_ADDRESS)
    }

    /// Coins issued so far. Sender-less payouts include recycled fees, which were
    /// already in circulation, so those fees are taken back out.
    pub fn get_current_supply(&self) -> f64 {
        self.chain
            .iter()
            .flat_map(Block::get_transactions)
            .map(|tx| {
                if tx.is_coinbase() {
                    tx.get_value()
                } else {
                    -tx.get_fee()
                }
            })
            .sum()
    }

    // ----- admission -----

    pub fn is_transaction_known(&self, txid: &str) -> bool {
        self.mempool.contains(txid)
            || self
                .chain
                .iter()
                .flat_map(Block::get_transactions)
                .any(|tx| tx.get_id() == txid)
    }

    /// Admits a signed transfer into the mempool. On any error the ledger is unchanged.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        let txid = tx.get_id().to_string();
        // minting is the consensus engine's job, nobody submits coinbases
        if tx.is_coinbase() || !tx.verify_signature() {
            return Err(BlockchainError::InvalidSignature(txid));
        }
        if !tx.has_valid_id() {
            return Err(BlockchainError::InvalidTransactionHash(txid));
        }
        let (value, fee) = (tx.get_value(), tx.get_fee());
        if !(value > 0.0 && value.is_finite()) {
            return Err(BlockchainError::NonPositiveValue(value));
        }
        if !(fee >= 0.0 && fee.is_finite()) {
            return Err(BlockchainError::NegativeFee(fee));
        }
        if self.is_transaction_known(&txid) {
            return Err(BlockchainError::ReplayedTransaction(txid));
        }

        let sender = tx.get_sender_address();
        let available = self.get_balance(sender) - self.mempool.pending_outflow(sender);
        let required = value + fee;
        if available < required {
            return Err(BlockchainError::InsufficientFunds {
                required,
                available,
            });
        }

        debug!("Transaction {txid} admitted to the mempool");
        self.mempool.add(tx);
        Ok(())
    }

    /// Suggested fee for a transaction of `tx_size` bytes at the current mempool load
    pub fn estimate_fee(&self, tx_size: usize) -> f64 {
        fee_model::required_fee(
            tx_size,
            fee_model::fullness(self.mempool.len()),
            self.access_control.get_network().min_transaction_fee,
        )
    }

    // ----- validation -----

    /// Checks `current` against its predecessor. The first failed check decides the error.
    pub fn validate_block(&self, current: &Block, previous: &Block) -> Result<()> {
        let index = current.get_index();
        let expected = previous.get_index() + 1;
        if index != expected {
            return Err(BlockchainError::InvalidBlockIndex {
                expected,
                found: index,
            });
        }
        if current.get_previous_hash() != previous.get_hash() {
            return Err(BlockchainError::InvalidPreviousHash { index });
        }
        if !current.has_valid_hash() {
            return Err(BlockchainError::InvalidBlockHash { index });
        }

        if current.is_proof_of_stake() {
            proof_of_stake::verify_block(current)
                .map_err(|reason| BlockchainError::InvalidProof { index, reason })?;
        } else {
            let pow = ProofOfWork::new_proof_of_work(self.difficulty());
            if !pow.meets_target(current.get_hash()) {
                return Err(BlockchainError::InvalidProof {
                    index,
                    reason: format!(
                        "hash does not have {} leading zeros",
                        pow.get_difficulty()
                    ),
                });
            }
        }

        for tx in current.get_transactions() {
            if !tx.has_valid_id() || !tx.verify_signature() {
                return Err(BlockchainError::InvalidEmbeddedTransaction {
                    index,
                    transaction_id: tx.get_id().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid_block(&self, current: &Block, previous: &Block) -> bool {
        self.validate_block(current, previous).is_ok()
    }

    /// Validates every adjacent pair of `blocks`.
    pub fn validate_chain(&self, blocks: &[Block]) -> Result<()> {
        for pair in blocks.windows(2) {
            self.validate_block(&pair[1], &pair[0])?;
        }
        Ok(())
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain(&self.chain).is_ok()
    }

    // A stored chain also has to start from a well-formed genesis block
    fn validate_stored(&self, chain: &[Block]) -> Result<()> {
        let genesis = &chain[0];
        let well_formed = genesis.get_index() == 0
            && genesis.get_previous_hash() == GENESIS_PREVIOUS_HASH
            && genesis.get_timestamp() == GENESIS_TIMESTAMP
            && genesis.get_transactions().is_empty();
        if !well_formed || !ProofOfWork::new_proof_of_work(self.difficulty()).validate(genesis) {
            return Err(BlockchainError::InvalidBlockHash { index: 0 });
        }
        self.validate_chain(chain)
    }

    // ----- block production -----

    // Reward and fees are split between the producer and the treasury. The mempool
    // follows the two payouts in admission order
    fn assemble_block(&self, producer: &KeyMaterial) -> Result<Block> {
        let total_fees = self.mempool.total_fees();
        let reward = monetary::block_reward(self.get_current_supply());
        let (producer_share, treasury_share) = monetary::split_reward(reward + total_fees);

        let issued_at = self.payout_timestamp()?;
        let mut transactions = Vec::with_capacity(self.mempool.len() + 2);
        transactions.push(
            Transaction::new_coinbase(producer, producer_share)?.stamped_at(issued_at),
        );
        if treasury_share > 0.0 {
            transactions.push(Transaction::new_treasury(treasury_share)?.stamped_at(issued_at));
        }
        transactions.extend(self.mempool.get_all().iter().cloned());

        let head = self.get_latest_block();
        Block::new_block(
            head.get_index() + 1,
            head.get_hash().to_string(),
            transactions,
            total_fees,
            reward,
        )
    }

    // Strictly after the head block's payouts, so payout ids never repeat even when
    // two blocks are mined within the same millisecond
    fn payout_timestamp(&self) -> Result<i64> {
        let now = current_timestamp()?;
        let last_payout = self
            .get_latest_block()
            .get_transactions()
            .iter()
            .filter(|tx| tx.is_coinbase())
            .map(Transaction::get_timestamp)
            .max();
        Ok(match last_payout {
            Some(last) => now.max(last + 1),
            None => now,
        })
    }

    fn producer_allowed(&self, address: &str) -> bool {
        if self.access_control.is_validator_allowed(address) {
            return true;
        }
        warn!("{address} is not an allowed validator on this private network, no block produced");
        false
    }

    /// Proof-of-work production. Returns `Ok(None)` when `miner` may not produce blocks;
    /// in that case nothing changes.
    pub fn mine_mempool(&mut self, miner: &KeyMaterial) -> Result<Option<Block>> {
        let miner_address = miner.address()?;
        if !self.producer_allowed(&miner_address) {
            return Ok(None);
        }

        let mut block = self.assemble_block(miner)?;
        info!(
            "Mining block {} with {} pending transactions at difficulty {}",
            block.get_index(),
            self.mempool.len(),
            self.difficulty()
        );
        ProofOfWork::new_proof_of_work(self.difficulty()).run(&mut block);
        self.commit_produced(block.clone());
        Ok(Some(block))
    }

    /// Proof-of-stake production: same payouts, sealed with the producer's signature
    /// instead of a nonce search. Needs the producer's private key.
    pub fn mine_mempool_pos(&mut self, validator: &KeyMaterial) -> Result<Option<Block>> {
        let validator_address = validator.address()?;
        if !self.producer_allowed(&validator_address) {
            return Ok(None);
        }

        let mut block = self.assemble_block(validator)?;
        proof_of_stake::sign_block(&mut block, validator)?;
        info!(
            "Produced PoS block {} as validator {validator_address}",
            block.get_index()
        );
        self.commit_produced(block.clone());
        Ok(Some(block))
    }

    fn commit_produced(&mut self, block: Block) {
        self.mempool.clear();
        self.chain.push(block);
        self.persist();
    }

    // ----- staking -----

    /// Locks `amount` of the address's spendable balance as stake.
    pub fn stake(&mut self, address: &str, amount: f64) -> Result<()> {
        if !(amount > 0.0 && amount.is_finite()) {
            return Err(BlockchainError::NonPositiveValue(amount));
        }
        // pending spends count too, otherwise staking could overdraw them once mined
        let available = self.get_balance(address) - self.mempool.pending_outflow(address);
        if available < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.stakes.add_stake(address, amount);
        info!(
            "{address} staked {amount}, total stake now {}",
            self.stakes.get_stake(address)
        );
        Ok(())
    }

    pub fn select_validator(&self) -> Option<String> {
        self.stakes.select_validator()
    }

    pub fn select_validator_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.stakes.select_validator_with(rng)
    }

    // ----- blocks from peers -----

    /// Appends a block produced elsewhere on top of the current head.
    pub fn append_block(&mut self, block: Block) -> Result<()> {
        self.validate_block(&block, self.get_latest_block())?;
        info!(
            "Appending block {} ({} transactions)",
            block.get_index(),
            block.get_transactions().len()
        );
        self.chain.push(block);
        self.revalidate_mempool();
        self.persist();
        Ok(())
    }

    /// Swaps in `blocks` if it shares our genesis, is longer, and validates end to end.
    /// On error the local chain is untouched.
    pub fn replace_chain(&mut self, blocks: Vec<Block>) -> Result<()> {
        let first = blocks
            .first()
            .ok_or_else(|| BlockchainError::InvalidChainSegment {
                index: 0,
                reason: "candidate chain is empty".to_string(),
            })?;
        // the whole block, not just its hash: nothing re-checks genesis contents later
        if first != self.get_genesis_block() {
            return Err(BlockchainError::GenesisMismatch);
        }
        if blocks.len() <= self.chain.len() {
            return Err(BlockchainError::InvalidChainSegment {
                index: (blocks.len() - 1) as u64,
                reason: format!(
                    "candidate height {} is not above local height {}",
                    blocks.len() - 1,
                    self.get_height()
                ),
            });
        }
        for pair in blocks.windows(2) {
            self.validate_block(&pair[1], &pair[0])
                .map_err(|e| BlockchainError::InvalidChainSegment {
                    index: pair[1].get_index(),
                    reason: e.to_string(),
                })?;
        }

        info!(
            "Replacing local chain (height {}) with received chain (height {})",
            self.get_height(),
            blocks.len() - 1
        );
        self.chain = blocks;
        self.revalidate_mempool();
        self.persist();
        Ok(())
    }

    // After the chain changes under it, drop whatever the chain now settles, then
    // re-run admission for the rest so spends the new chain can't cover go too
    fn revalidate_mempool(&mut self) {
        let settled = {
            let on_chain: HashSet<&str> = self
                .chain
                .iter()
                .flat_map(Block::get_transactions)
                .map(Transaction::get_id)
                .collect();
            self.mempool.remove_included(&on_chain)
        };

        let pending = self.mempool.take_all();
        let before = pending.len();
        for tx in pending {
            if let Err(e) = self.add_transaction(tx) {
                debug!("Dropped pending transaction after chain update: {e}");
            }
        }
        let invalidated = before - self.mempool.len();
        if settled + invalidated > 0 {
            info!(
                "Removed {settled} settled and {invalidated} invalidated pending transactions"
            );
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.chain) {
            error!("Failed to persist chain at height {}: {e}", self.get_height());
        }
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.get_height(),
            current_supply: self.get_current_supply(),
            treasury_balance: self.get_treasury_balance(),
            mempool_size: self.mempool.len(),
            total_staked: self.stakes.total_stake(),
            stakers: self.stakes.len(),
        }
    }
}
