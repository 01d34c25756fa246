//! Test utilities for ledger and network testing

use crate::config::NetworkConfig;
use crate::core::Blockchain;
use crate::wallet::Wallet;

/// Network parameters for tests: difficulty 1 keeps mining near-instant
pub fn test_network() -> NetworkConfig {
    NetworkConfig {
        difficulty: 1,
        ..NetworkConfig::default()
    }
}

/// In-memory public-network ledger at test difficulty
pub fn create_test_blockchain() -> Blockchain {
    Blockchain::in_memory(test_network())
}

/// A fresh wallet that has mined `blocks` blocks on `chain` (45 coins each)
pub fn funded_wallet(chain: &mut Blockchain, blocks: usize) -> Wallet {
    let wallet = Wallet::new().expect("wallet generation");
    for _ in 0..blocks {
        chain
            .mine_mempool(wallet.get_public_key())
            .expect("mining on a test chain")
            .expect("public test network allows every miner");
    }
    wallet
}
