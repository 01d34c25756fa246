// A running node: the shared ledger, its sled store, the peer set and the server
// wired together. Local operations (submit, mine, stake) go through here so that
// whatever they change is also announced to peers

use crate::config::Config;
use crate::core::{Block, Blockchain, ChainStats, Transaction};
use crate::error::Result;
use crate::network::sync::{read_ledger, write_ledger};
use crate::network::{Message, PeerManager, Server};
use crate::utils::KeyMaterial;
use crate::wallet::Wallet;
use log::{debug, error, info, warn};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

/// Which block production strategy `run_producer` uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionMode {
    ProofOfWork,
    ProofOfStake,
}

pub struct Node {
    config: Config,
    blockchain: Arc<RwLock<Blockchain>>,
    peer_manager: Arc<PeerManager>,
    server: Server,
}

impl Node {
    pub fn new(config: Config, blockchain: Blockchain) -> Node {
        let blockchain = Arc::new(RwLock::new(blockchain));
        let peer_manager = Arc::new(PeerManager::new(config.max_connections));
        let server = Server::new(Arc::clone(&blockchain), Arc::clone(&peer_manager));
        Node {
            config,
            blockchain,
            peer_manager,
            server,
        }
    }

    /// Opens (or creates) the node's sled database under `config.db_path()`
    pub fn open(config: Config) -> Result<Node> {
        let blockchain = Blockchain::open(&config)?;
        Ok(Self::new(config, blockchain))
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_blockchain(&self) -> Arc<RwLock<Blockchain>> {
        Arc::clone(&self.blockchain)
    }

    /// Binds the configured address, accepts peers on a background thread and dials
    /// every configured peer. Returns the bound address.
    pub fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.get_node_addr())?;
        let local_addr = listener.local_addr()?;
        info!("Node listening on {local_addr}");

        let server = self.server.clone();
        thread::spawn(move || server.serve(listener));

        for peer in &self.config.peers {
            if let Err(e) = self.connect_to_peer(peer) {
                warn!("Could not reach configured peer {peer}: {e}");
            }
        }
        Ok(local_addr)
    }

    pub fn connect_to_peer(&self, addr: &str) -> Result<SocketAddr> {
        self.server.connect_to_peer(addr)
    }

    pub fn peer_count(&self) -> Result<usize> {
        self.peer_manager.get_connected_count()
    }

    /// Admits a local transaction and gossips it
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        let message = Message::broadcast_transaction(&tx)?;
        write_ledger(&self.blockchain)?.add_transaction(tx)?;
        self.announce(&message);
        Ok(())
    }

    /// Proof-of-work production; the new head is announced to peers
    pub fn mine(&self, miner: &KeyMaterial) -> Result<Option<Block>> {
        let block = write_ledger(&self.blockchain)?.mine_mempool(miner)?;
        self.announce_block(block.as_ref())?;
        Ok(block)
    }

    /// Proof-of-stake production with `validator`'s key
    pub fn produce_pos(&self, validator: &Wallet) -> Result<Option<Block>> {
        let block = write_ledger(&self.blockchain)?.mine_mempool_pos(validator.get_private_key())?;
        self.announce_block(block.as_ref())?;
        Ok(block)
    }

    /// Runs a stake-weighted draw and produces a block only if `validator` wins it
    pub fn produce_pos_if_selected(&self, validator: &Wallet) -> Result<Option<Block>> {
        let block = {
            let mut chain = write_ledger(&self.blockchain)?;
            match chain.select_validator() {
                Some(selected) if selected == validator.get_address() => {
                    chain.mine_mempool_pos(validator.get_private_key())?
                }
                Some(selected) => {
                    debug!("Validator {selected} was selected for the next block");
                    None
                }
                None => {
                    debug!("No stakes registered, nobody to select");
                    None
                }
            }
        };
        self.announce_block(block.as_ref())?;
        Ok(block)
    }

    pub fn stake(&self, address: &str, amount: f64) -> Result<()> {
        write_ledger(&self.blockchain)?.stake(address, amount)
    }

    pub fn get_balance(&self, address: &str) -> Result<f64> {
        Ok(read_ledger(&self.blockchain)?.get_balance(address))
    }

    pub fn estimate_fee(&self, tx_size: usize) -> Result<f64> {
        Ok(read_ledger(&self.blockchain)?.estimate_fee(tx_size))
    }

    pub fn stats(&self) -> Result<ChainStats> {
        Ok(read_ledger(&self.blockchain)?.stats())
    }

    /// Produces a block every `target_block_time_secs` until production fails. Meant
    /// for its own thread; `startnode --mine` parks the main thread here.
    pub fn run_producer(&self, mode: ProductionMode, wallet: &Wallet) -> Result<()> {
        let interval = Duration::from_secs(self.config.network.target_block_time_secs.max(1));
        info!(
            "Producing blocks ({mode:?}) every {}s as {}",
            interval.as_secs(),
            wallet.get_address()
        );
        loop {
            thread::sleep(interval);
            let produced = match mode {
                ProductionMode::ProofOfWork => self.mine(wallet.get_public_key()),
                ProductionMode::ProofOfStake => self.produce_pos_if_selected(wallet),
            };
            match produced {
                Ok(Some(block)) => info!("Produced block {} ({})", block.get_index(), block.get_hash()),
                Ok(None) => debug!("No block produced this round"),
                Err(e) => {
                    error!("Block production failed: {e}");
                    return Err(e);
                }
            }
        }
    }

    fn announce_block(&self, block: Option<&Block>) -> Result<()> {
        if let Some(block) = block {
            self.announce(&Message::response_blockchain(std::slice::from_ref(block))?);
        }
        Ok(())
    }

    // Gossip is best effort: the local change already happened
    fn announce(&self, message: &Message) {
        match self.peer_manager.broadcast(message) {
            Ok(delivered) => debug!("Announced {:?} to {delivered} peers", message.kind),
            Err(e) => warn!("Failed to announce {:?}: {e}", message.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{create_test_blockchain, test_network};

    fn test_node() -> Node {
        let config = Config {
            node_addr: "127.0.0.1:0".to_string(),
            network: test_network(),
            ..Config::default()
        };
        Node::new(config, create_test_blockchain())
    }

    #[test]
    fn test_local_operations() {
        let node = test_node();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();

        let block = node.mine(alice.get_public_key()).unwrap().unwrap();
        assert_eq!(block.get_index(), 1);
        assert_eq!(node.get_balance(alice.get_address()).unwrap(), 45.0);

        node.submit_transaction(alice.send_funds(bob.get_public_key(), 5.0, 0.5).unwrap())
            .unwrap();
        assert_eq!(node.stats().unwrap().mempool_size, 1);
        node.mine(bob.get_public_key()).unwrap();
        // 5 received plus 90% of (50 reward + 0.5 fee)
        assert!((node.get_balance(bob.get_address()).unwrap() - 50.45).abs() < 1e-9);
    }

    #[test]
    fn test_pos_requires_selection() {
        let node = test_node();
        let validator = Wallet::new().unwrap();
        // nobody has staked yet
        assert_eq!(node.produce_pos_if_selected(&validator).unwrap(), None);

        node.mine(validator.get_public_key()).unwrap();
        node.stake(validator.get_address(), 10.0).unwrap();
        let block = node.produce_pos_if_selected(&validator).unwrap().unwrap();
        assert_eq!(block.get_validator(), Some(validator.get_address()));
        assert_eq!(node.stats().unwrap().total_staked, 10.0);
    }

    #[test]
    fn test_start_binds_ephemeral_port() {
        let node = test_node();
        let addr = node.start().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(node.peer_count().unwrap(), 0);
    }
}
