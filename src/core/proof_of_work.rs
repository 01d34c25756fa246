use crate::core::Block;

/// Leading-zero target over the hex block hash. The search itself has no upper
/// bound and no cancellation: it returns once a nonce hits the target.
pub struct ProofOfWork {
    difficulty: usize,
    target_prefix: String,
}

impl ProofOfWork {
    pub fn new_proof_of_work(difficulty: usize) -> ProofOfWork {
        ProofOfWork {
            difficulty,
            target_prefix: "0".repeat(difficulty),
        }
    }

    pub fn get_difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn meets_target(&self, hash: &str) -> bool {
        hash.starts_with(&self.target_prefix)
    }

    /// Validate proof-of-work for a block: the stored hash must be genuine and hit the target
    pub fn validate(&self, block: &Block) -> bool {
        block.has_valid_hash() && self.meets_target(block.get_hash())
    }

    /// Searches nonces upwards from 0 and seals the block with the first hit.
    pub fn run(&self, block: &mut Block) {
        let mut nonce = 0u64;
        loop {
            let hash = block.hash_with_nonce(nonce);
            if self.meets_target(&hash) {
                log::debug!("Found nonce {nonce} for block {}", block.get_index());
                block.seal(nonce, hash);
                return;
            }
            nonce += 1;
        }
    }
}
