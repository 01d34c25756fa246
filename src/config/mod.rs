//! Configuration management
//!
//! Node settings (listen address, data directory, peers) and the network
//! parameters every node on the same network must share.

pub mod settings;

pub use settings::{Config, NetworkConfig};
