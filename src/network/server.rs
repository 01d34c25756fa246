use crate::core::{Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::sync::{self, Outbound};
use crate::network::{Message, PeerManager};
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const TCP_CONNECT_TIMEOUT: u64 = 5000;

/// TCP side of a node: accepts and dials peer links and feeds every line they carry
/// through [`sync::handle_message`].
#[derive(Clone)]
pub struct Server {
    blockchain: Arc<RwLock<Blockchain>>,
    peer_manager: Arc<PeerManager>,
}

impl Server {
    pub fn new(blockchain: Arc<RwLock<Blockchain>>, peer_manager: Arc<PeerManager>) -> Self {
        Self {
            blockchain,
            peer_manager,
        }
    }

    /// Accept loop. Each link gets its own reader thread.
    pub fn serve(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if !self
                        .peer_manager
                        .should_accept_connection()
                        .unwrap_or(false)
                    {
                        if let Ok(addr) = stream.peer_addr() {
                            warn!("Rejecting connection from {addr}: connection limit reached");
                        }
                        continue;
                    }
                    self.spawn_connection(stream);
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    /// Dials a peer and handles the link like an inbound one
    pub fn connect_to_peer(&self, addr: &str) -> Result<SocketAddr> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| BlockchainError::Network(format!("Invalid peer address {addr}: {e}")))?
            .next()
            .ok_or_else(|| BlockchainError::Network(format!("No address for peer {addr}")))?;
        let stream =
            TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_CONNECT_TIMEOUT))
                .map_err(|e| {
                    BlockchainError::Network(format!("Failed to connect to {addr}: {e}"))
                })?;
        self.spawn_connection(stream);
        Ok(socket_addr)
    }

    fn spawn_connection(&self, stream: TcpStream) {
        let server = self.clone();
        thread::spawn(move || {
            let peer_addr = stream.peer_addr().ok();
            if let Err(e) = server.handle_connection(stream) {
                match peer_addr {
                    Some(addr) => error!("Error handling connection with {addr}: {e}"),
                    None => error!("Error handling connection: {e}"),
                }
            }
        });
    }

    // Both sides open with QUERY_LATEST so whichever one is behind catches up
    fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let peer_addr = stream.peer_addr()?;
        let id = self.peer_manager.register(&stream)?;
        let result = self
            .peer_manager
            .send_to(id, &Message::query_latest())
            .and_then(|_| self.read_loop(id, peer_addr, stream));
        self.peer_manager.remove(id)?;
        result
    }

    fn read_loop(&self, id: Uuid, peer_addr: SocketAddr, stream: TcpStream) -> Result<()> {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let message = match Message::from_line(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Ignoring malformed message from {peer_addr}: {e}");
                    continue;
                }
            };
            debug!("Received {:?} from {peer_addr}", message.kind);

            let actions = match sync::handle_message(&self.blockchain, &message) {
                Ok(actions) => actions,
                Err(BlockchainError::Concurrency(reason)) => {
                    return Err(BlockchainError::Concurrency(reason))
                }
                Err(e) => {
                    warn!("Ignoring {:?} from {peer_addr}: {e}", message.kind);
                    continue;
                }
            };
            for action in actions {
                self.dispatch(id, action)?;
            }
        }
        info!("Peer {peer_addr} closed the connection");
        Ok(())
    }

    fn dispatch(&self, id: Uuid, action: Outbound) -> Result<()> {
        match action {
            Outbound::Reply(message) => self.peer_manager.send_to(id, &message),
            Outbound::Broadcast(message) => {
                let delivered = self.peer_manager.broadcast(&message)?;
                debug!("Broadcast {:?} to {delivered} peers", message.kind);
                Ok(())
            }
        }
    }
}

/// One-shot client: hands a signed transaction to the node at `addr` and hangs up
pub fn send_transaction(addr: &str, tx: &Transaction) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream.set_write_timeout(Some(Duration::from_millis(TCP_CONNECT_TIMEOUT)))?;
    stream.write_all(Message::broadcast_transaction(tx)?.to_line()?.as_bytes())?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;

    // read the node's opening QUERY_LATEST so closing doesn't reset the link
    // before the node has read our line
    stream.set_read_timeout(Some(Duration::from_millis(TCP_CONNECT_TIMEOUT)))?;
    let mut greeting = String::new();
    if let Err(e) = BufReader::new(&stream).read_line(&mut greeting) {
        debug!("No greeting from {addr}: {e}");
    }
    info!("Sent transaction {} to {addr}", tx.get_id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MessageType;
    use crate::testnet::{create_test_blockchain, funded_wallet};
    use crate::wallet::Wallet;
    use std::time::Instant;

    fn start_server(blockchain: Blockchain) -> (Server, SocketAddr) {
        let server = Server::new(
            Arc::new(RwLock::new(blockchain)),
            Arc::new(PeerManager::new(8)),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepting = server.clone();
        thread::spawn(move || accepting.serve(listener));
        (server, addr)
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_new_link_is_queried_for_latest() {
        let (_server, addr) = start_server(create_test_blockchain());
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        assert_eq!(
            Message::from_line(&line).unwrap().kind,
            MessageType::QueryLatest
        );
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let (_server, addr) = start_server(create_test_blockchain());
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap(); // the opening QUERY_LATEST

        stream.write_all(b"garbage\n").unwrap();
        stream
            .write_all(Message::query_all().to_line().unwrap().as_bytes())
            .unwrap();
        line.clear();
        reader.read_line(&mut line).unwrap();
        let reply = Message::from_line(&line).unwrap();
        assert_eq!(reply.kind, MessageType::ResponseBlockchain);
        assert_eq!(reply.blocks().unwrap().len(), 1);
    }

    #[test]
    fn test_send_transaction_reaches_mempool() {
        let mut chain = create_test_blockchain();
        let alice = funded_wallet(&mut chain, 1);
        let (server, addr) = start_server(chain);
        let bob = Wallet::new().unwrap();
        let tx = alice.send_funds(bob.get_public_key(), 3.0, 0.1).unwrap();

        send_transaction(&addr.to_string(), &tx).unwrap();
        assert!(wait_for(|| {
            server
                .blockchain
                .read()
                .map(|chain| chain.get_mempool().contains(tx.get_id()))
                .unwrap_or(false)
        }));
    }
}
