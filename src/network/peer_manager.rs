use crate::error::{BlockchainError, Result};
use crate::network::Message;
use log::{debug, info};
use std::collections::HashMap;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

const TCP_WRITE_TIMEOUT: u64 = 5000;

struct Peer {
    addr: SocketAddr,
    writer: Mutex<TcpStream>,
}

impl Peer {
    fn send(&self, line: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| BlockchainError::Concurrency(format!("Peer writer lock poisoned: {e}")))?;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Peer manager for the broadcast set
///
/// Tracks the write half of every live peer link:
/// - Each link gets a fresh id, so two links to the same address are distinct peers
/// - Writes that fail drop the peer on the spot; there is no retry or reconnect
/// - Reading is left to the connection's own thread
pub struct PeerManager {
    peers: RwLock<HashMap<Uuid, Arc<Peer>>>,
    max_connections: usize,
}

impl PeerManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Adds a link to the broadcast set and returns its id
    pub fn register(&self, stream: &TcpStream) -> Result<Uuid> {
        let addr = stream.peer_addr()?;
        let writer = stream.try_clone()?;
        writer
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

        let id = Uuid::new_v4();
        let mut peers = self
            .peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        peers.insert(
            id,
            Arc::new(Peer {
                addr,
                writer: Mutex::new(writer),
            }),
        );
        info!("Connected to peer: {addr} ({} peers)", peers.len());
        Ok(id)
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        let mut peers = self
            .peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        if let Some(peer) = peers.remove(&id) {
            info!("Disconnected from peer: {}", peer.addr);
        }
        Ok(())
    }

    fn get_peer(&self, id: Uuid) -> Result<Option<Arc<Peer>>> {
        let peers = self
            .peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(peers.get(&id).cloned())
    }

    /// Sends to one peer; a failed write removes it
    pub fn send_to(&self, id: Uuid, message: &Message) -> Result<()> {
        let peer = self
            .get_peer(id)?
            .ok_or_else(|| BlockchainError::Network(format!("Unknown peer {id}")))?;
        if let Err(e) = peer.send(&message.to_line()?) {
            self.remove(id)?;
            return Err(BlockchainError::Network(format!(
                "Failed to send to {}: {e}",
                peer.addr
            )));
        }
        Ok(())
    }

    /// Fire-and-forget send to every peer. Returns how many peers took the message.
    pub fn broadcast(&self, message: &Message) -> Result<usize> {
        let line = message.to_line()?;
        // snapshot first so no socket write happens under the lock
        let snapshot: Vec<(Uuid, Arc<Peer>)> = {
            let peers = self
                .peers
                .read()
                .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
            peers.iter().map(|(id, peer)| (*id, Arc::clone(peer))).collect()
        };

        let mut delivered = 0;
        for (id, peer) in snapshot {
            match peer.send(&line) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("Broadcast to {} failed: {e}", peer.addr);
                    self.remove(id)?;
                }
            }
        }
        Ok(delivered)
    }

    pub fn get_connected_addresses(&self) -> Result<Vec<SocketAddr>> {
        let peers = self
            .peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(peers.values().map(|peer| peer.addr).collect())
    }

    /// Get number of connected peers
    pub fn get_connected_count(&self) -> Result<usize> {
        let peers = self
            .peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(peers.len())
    }

    /// Check if we should accept more connections
    pub fn should_accept_connection(&self) -> Result<bool> {
        Ok(self.get_connected_count()? < self.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_register_and_remove() {
        let manager = PeerManager::new(2);
        let (_client, server) = connected_pair();
        let id = manager.register(&server).unwrap();
        assert_eq!(manager.get_connected_count().unwrap(), 1);
        assert!(manager.should_accept_connection().unwrap());

        manager.remove(id).unwrap();
        assert_eq!(manager.get_connected_count().unwrap(), 0);
        // removing twice is harmless
        manager.remove(id).unwrap();
    }

    #[test]
    fn test_connection_limit() {
        let manager = PeerManager::new(1);
        let (_client, server) = connected_pair();
        manager.register(&server).unwrap();
        assert!(!manager.should_accept_connection().unwrap());
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let manager = PeerManager::new(8);
        let (client_a, server_a) = connected_pair();
        let (client_b, server_b) = connected_pair();
        manager.register(&server_a).unwrap();
        manager.register(&server_b).unwrap();

        assert_eq!(manager.broadcast(&Message::query_all()).unwrap(), 2);
        for client in [client_a, client_b] {
            let mut line = String::new();
            BufReader::new(client).read_line(&mut line).unwrap();
            assert_eq!(Message::from_line(&line).unwrap(), Message::query_all());
        }
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let manager = PeerManager::new(8);
        assert!(manager
            .send_to(Uuid::new_v4(), &Message::query_latest())
            .is_err());
    }
}
