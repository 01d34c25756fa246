//! # Nexis Chain - My Account-Based Ledger Node
//!
//! A small ledger node I can run several copies of on one machine and watch them
//! agree on a single chain. When I come back to this code, here's what I need to remember:
//!
//! ## What I Built
//! - **Account Ledger**: Balances are replayed from the chain, no UTXO bookkeeping
//! - **Two Consensus Modes**: Proof-of-work mining and stake-weighted proof-of-stake
//! - **Economics**: Fixed block reward with a supply cap and a 10% treasury cut
//! - **P2P Gossip**: Line-delimited JSON over TCP, longest valid chain wins
//! - **Private Networks**: An allow-list of validators who may produce blocks
//! - **Persistence**: Each node keeps its chain in its own Sled database
//!
//! ## How I Organized My Code
//! - `core/`: Blocks, transactions, the ledger itself, PoW, PoS and the economics
//! - `wallet/`: Key pairs and signed transfers
//! - `network/`: Wire messages, the sync handler, peers, the server and the node
//! - `storage/`: The mempool and the chain stores (Sled and in-memory)
//! - `config/`: Node settings and the network parameters nodes must share
//! - `utils/`: Hashing, signing, key encoding and the binary codec
//! - `cli/`: Command-line interface for the node binary
//!
//! ## Key Design Decisions I Made
//! - The whole ledger sits behind one `RwLock`, so every check-then-act is atomic
//! - `network::sync::handle_message` is pure protocol; sockets only deliver its output
//! - Genesis is deterministic, so nodes with the same difficulty share it
//! - Admission errors are typed so callers can tell a replay from an overdraft
//!
//! ## When I Need to Understand Something
//! 1. Start with `main.rs` to see the CLI commands
//! 2. Look at `core/blockchain.rs` for admission, production and validation
//! 3. Check `core/transaction.rs` for how ids and signatures are computed
//! 4. Review `network/sync.rs` for how nodes converge

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, NetworkConfig};
pub use core::{
    AccessControlManager, Block, Blockchain, ChainStats, ProofOfWork, StakeTable, Transaction,
    TREASURY_ADDRESS,
};
pub use error::{BlockchainError, Result};
pub use network::{send_transaction, Message, MessageType, Node, ProductionMode, Server};
pub use storage::{ChainStore, MemoryChainStore, MemoryPool, SledChainStore};
pub use utils::{current_timestamp, new_key_pair, sha256_hex, KeyMaterial};
pub use wallet::Wallet;
