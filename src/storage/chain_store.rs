// Where the chain lives between restarts. The ledger only ever loads it once at
// startup and writes the whole thing back after each append or replacement

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use log::{debug, info};
use sled::Batch;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

const BLOCKS_TREE: &str = "blocks";
const OPEN_ATTEMPTS: u32 = 100;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(50);

pub trait ChainStore: Send + Sync {
    /// The stored chain in index order, or `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<Vec<Block>>>;

    fn save(&self, chain: &[Block]) -> Result<()>;
}

/// sled-backed store: one tree, keyed by big-endian block index so iteration
/// order is chain order.
pub struct SledChainStore {
    db: sled::Db,
    blocks: sled::Tree,
}

impl SledChainStore {
    /// Opens (or creates) the database at `path`. A handle that was just dropped can
    /// hold the file lock for a moment while sled's flusher winds down, so lock
    /// contention is retried for a few seconds before giving up.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SledChainStore> {
        let path = path.as_ref();
        let mut attempt = 1;
        let db = loop {
            match sled::open(path) {
                Ok(db) => break db,
                Err(e) if attempt < OPEN_ATTEMPTS && is_lock_contention(&e) => {
                    debug!(
                        "Database at {} is still locked (attempt {attempt}), retrying",
                        path.display()
                    );
                    attempt += 1;
                    thread::sleep(OPEN_RETRY_DELAY);
                }
                Err(e) => {
                    return Err(BlockchainError::Database(format!(
                        "Failed to open database at {}: {e}",
                        path.display()
                    )))
                }
            }
        };
        let blocks = db.open_tree(BLOCKS_TREE)?;
        Ok(SledChainStore { db, blocks })
    }
}

// sled reports a held lock as a plain IO error wrapping the flock failure
fn is_lock_contention(error: &sled::Error) -> bool {
    match error {
        sled::Error::Io(e) => {
            e.kind() == ErrorKind::WouldBlock || e.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

impl ChainStore for SledChainStore {
    fn load(&self) -> Result<Option<Vec<Block>>> {
        let mut chain = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (_, value) = entry?;
            chain.push(Block::deserialize(&value)?);
        }
        if chain.is_empty() {
            return Ok(None);
        }
        info!("Loaded {} blocks from disk", chain.len());
        Ok(Some(chain))
    }

    fn save(&self, chain: &[Block]) -> Result<()> {
        // One atomic batch: overwrite every height we have and drop any leftovers
        // from a longer chain that was replaced
        let mut batch = Batch::default();
        for block in chain {
            batch.insert(block.get_index().to_be_bytes().to_vec(), block.serialize()?);
        }
        for entry in self.blocks.range((chain.len() as u64).to_be_bytes()..) {
            let (key, _) = entry?;
            batch.remove(key);
        }
        self.blocks.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Keeps the chain in memory only. Used by tests and throwaway nodes.
#[derive(Default)]
pub struct MemoryChainStore {
    chain: Mutex<Option<Vec<Block>>>,
}

impl MemoryChainStore {
    pub fn new() -> MemoryChainStore {
        MemoryChainStore::default()
    }

    pub fn with_chain(chain: Vec<Block>) -> MemoryChainStore {
        MemoryChainStore {
            chain: Mutex::new(Some(chain)),
        }
    }
}

impl ChainStore for MemoryChainStore {
    fn load(&self) -> Result<Option<Vec<Block>>> {
        let chain = self
            .chain
            .lock()
            .map_err(|e| BlockchainError::Concurrency(format!("Chain store lock poisoned: {e}")))?;
        Ok((*chain).clone())
    }

    fn save(&self, chain: &[Block]) -> Result<()> {
        let mut stored = self
            .chain
            .lock()
            .map_err(|e| BlockchainError::Concurrency(format!("Chain store lock poisoned: {e}")))?;
        *stored = Some(chain.to_vec());
        Ok(())
    }
}
