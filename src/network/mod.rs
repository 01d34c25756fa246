//! Peer-to-peer networking
//!
//! Nodes talk over plain TCP, one JSON message per line. Four message kinds
//! are enough to gossip transactions, announce new blocks and resolve forks
//! by adopting the longest valid chain.

pub mod message;
pub mod node;
pub mod peer_manager;
pub mod server;
pub mod sync;

pub use message::{Message, MessageType};
pub use node::{Node, ProductionMode};
pub use peer_manager::PeerManager;
pub use server::{send_transaction, Server};
pub use sync::{handle_message, Outbound};
