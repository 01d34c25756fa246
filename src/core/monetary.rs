/// Ledger economics
///
/// Every node has to agree on these values bit for bit: they feed the genesis hash,
/// the coinbase amounts and the treasury split, so a node built with different
/// numbers forks off at the first block.
///
/// ## Issuance
/// - **Block reward**: a flat 50 coins per block until the supply cap is reached
/// - **Supply cap**: 21 million coins; the last block pays whatever is left
/// - **Treasury**: 10% of every block's reward plus fees goes to a fixed address
///
/// Number of leading zero hex digits a PoW block hash needs
pub const DIFFICULTY: usize = 4;

/// Newly issued coins per block, before the treasury split
pub const BLOCK_REWARD: f64 = 50.0;

/// Hard cap on issued coins
pub const MAX_SUPPLY: f64 = 21_000_000.0;

/// Share of reward plus fees routed to the treasury
pub const TREASURY_PERCENTAGE: f64 = 0.10;

/// Treasury account; sha256("NEXIS_TREASURY"), so no key pair maps to it
pub const TREASURY_ADDRESS: &str =
    "1c174c8c8974918c391db2a05d1afd43f69bef4279251bddccf237dc4d3cf7c9";

/// Fixed genesis timestamp (2025-01-18T06:00:00Z) so all nodes derive the same genesis hash
pub const GENESIS_TIMESTAMP: i64 = 1_737_180_000_000;

/// `previousHash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Reward for the next block given what has been issued so far.
pub fn block_reward(current_supply: f64) -> f64 {
    BLOCK_REWARD.min(MAX_SUPPLY - current_supply).max(0.0)
}

/// Splits a block's pot (reward plus fees) into `(miner_share, treasury_share)`.
pub fn split_reward(pot: f64) -> (f64, f64) {
    let treasury_share = pot * TREASURY_PERCENTAGE;
    (pot - treasury_share, treasury_share)
}

/// Fee suggestions for wallets. Admission only requires `fee >= 0`; this is advice.
pub mod fee_model {
    /// Fee for an average sized transaction on an idle network
    pub const BASE_FEE: f64 = 0.1;

    /// Size in bytes the base fee is quoted for
    pub const REFERENCE_TX_SIZE: f64 = 256.0;

    /// Pending transactions that count as a full block when measuring congestion
    pub const MAX_BLOCK_SIZE: f64 = 1000.0;

    pub fn congestion_multiplier(block_fullness: f64) -> f64 {
        if block_fullness > 0.8 {
            5.0
        } else if block_fullness > 0.5 {
            1.5
        } else {
            1.0
        }
    }

    /// Suggested fee for a transaction of `tx_size` bytes when the next block is
    /// `block_fullness` (0.0..=1.0) full, never below `min_fee`.
    pub fn required_fee(tx_size: usize, block_fullness: f64, min_fee: f64) -> f64 {
        let size_factor = tx_size as f64 / REFERENCE_TX_SIZE;
        let fee = BASE_FEE * size_factor * congestion_multiplier(block_fullness);
        fee.max(min_fee)
    }

    /// Fullness of the next block given the current mempool length.
    pub fn fullness(pending: usize) -> f64 {
        pending as f64 / MAX_BLOCK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::fee_model::*;
    use super::*;

    #[test]
    fn test_economic_constants() {
        const _: () = assert!(DIFFICULTY == 4);
        assert_eq!(TREASURY_ADDRESS.len(), 64);
        assert!(TREASURY_PERCENTAGE > 0.0 && TREASURY_PERCENTAGE < 1.0);
    }

    #[test]
    fn test_block_reward_is_capped() {
        assert_eq!(block_reward(0.0), 50.0);
        assert_eq!(block_reward(MAX_SUPPLY - 20.0), 20.0);
        assert_eq!(block_reward(MAX_SUPPLY), 0.0);
        assert_eq!(block_reward(MAX_SUPPLY + 1.0), 0.0);
    }

    #[test]
    fn test_split_reward() {
        let (miner, treasury) = split_reward(50.0);
        assert_eq!(miner, 45.0);
        assert_eq!(treasury, 5.0);

        let (miner, treasury) = split_reward(0.0);
        assert_eq!(miner + treasury, 0.0);
    }

    #[test]
    fn test_fee_model() {
        assert!((required_fee(256, 0.1, 0.01) - 0.1).abs() < 1e-12);
        assert!((required_fee(256, 0.6, 0.01) - 0.15).abs() < 1e-12);
        assert!((required_fee(256, 0.9, 0.01) - 0.5).abs() < 1e-12);
        // tiny transactions still pay the floor
        assert_eq!(required_fee(1, 0.0, 0.01), 0.01);
        assert_eq!(fullness(500), 0.5);
    }
}
