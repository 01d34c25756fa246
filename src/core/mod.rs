//! Core ledger functionality
//!
//! Blocks, transactions, the ledger state machine, both block-production
//! strategies and the economic constants they share.

pub mod access_control;
pub mod block;
pub mod blockchain;
pub mod monetary;
pub mod proof_of_stake;
pub mod proof_of_work;
pub mod transaction;

pub use access_control::AccessControlManager;
pub use block::Block;
pub use blockchain::{Blockchain, ChainStats};
pub use monetary::{
    BLOCK_REWARD, DIFFICULTY, GENESIS_TIMESTAMP, MAX_SUPPLY, TREASURY_ADDRESS,
    TREASURY_PERCENTAGE,
};
pub use proof_of_stake::StakeTable;
pub use proof_of_work::ProofOfWork;
pub use transaction::Transaction;
