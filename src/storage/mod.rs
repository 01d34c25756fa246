//! Data storage and persistence
//!
//! The pending-transaction pool and the stores the ledger persists its chain to.

pub mod chain_store;
pub mod memory_pool;

pub use chain_store::{ChainStore, MemoryChainStore, SledChainStore};
pub use memory_pool::MemoryPool;
