use crate::core::monetary::DIFFICULTY;
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "data";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_DATA_DIR_KEY: &str = "NODE_DATA_DIR";
const NODE_PEERS_KEY: &str = "NODE_PEERS";
const NODE_PRIVATE_NETWORK_KEY: &str = "NODE_PRIVATE_NETWORK";

/// Consensus-relevant settings. Every node on a network must agree on `difficulty`,
/// otherwise their genesis blocks differ and they reject each other's chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Private networks only accept blocks produced by allow-listed validators
    pub private_network: bool,
    /// Floor for suggested fees; admission itself only requires `fee >= 0`
    pub min_transaction_fee: f64,
    pub target_block_time_secs: u64,
    pub difficulty: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            private_network: false,
            min_transaction_fee: 0.01,
            target_block_time_secs: 10,
            difficulty: DIFFICULTY,
        }
    }
}

/// Node settings, read from an optional TOML file and then overridden by environment
/// variables (`NODE_ADDRESS`, `NODE_DATA_DIR`, `NODE_PEERS`, `NODE_PRIVATE_NETWORK`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_addr: String,
    pub data_dir: PathBuf,
    /// Peers dialed at startup
    pub peers: Vec<String>,
    pub max_connections: usize,
    /// Validator addresses permitted to produce blocks on a private network
    pub allowed_validators: Vec<String>,
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            peers: vec![],
            max_connections: 32,
            allowed_validators: vec![],
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path` if given (defaults otherwise), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    // Takes the lookup as a closure so tests don't have to touch the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Some(dir) = lookup(NODE_DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(peers) = lookup(NODE_PEERS_KEY) {
            self.peers = peers
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(flag) = lookup(NODE_PRIVATE_NETWORK_KEY) {
            self.network.private_network = flag.parse().map_err(|_| {
                BlockchainError::Config(format!(
                    "{NODE_PRIVATE_NETWORK_KEY} must be true or false, got {flag}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn get_node_addr(&self) -> &str {
        self.node_addr.as_str()
    }

    /// Extract node ID from address (e.g., "127.0.0.1:2001" -> "2001")
    pub fn extract_node_id_from_addr(&self) -> String {
        match self.node_addr.rsplit(':').next() {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => "default".to_string(),
        }
    }

    /// Each node gets its own database so several can run from one working directory
    pub fn db_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("node_{}", self.extract_node_id_from_addr()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.get_node_addr(), "127.0.0.1:2001");
        assert_eq!(config.network.difficulty, 4);
        assert_eq!(config.network.min_transaction_fee, 0.01);
        assert!(!config.network.private_network);
        assert_eq!(config.db_path(), PathBuf::from("data").join("node_2001"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            node_addr = "127.0.0.1:3000"
            allowed_validators = ["abc"]

            [network]
            private_network = true
            "#,
        )
        .unwrap();
        assert_eq!(config.extract_node_id_from_addr(), "3000");
        assert_eq!(config.allowed_validators, vec!["abc".to_string()]);
        assert!(config.network.private_network);
        assert_eq!(config.network.target_block_time_secs, 10);
        assert_eq!(config.max_connections, 32);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("node_addr = [").unwrap_err();
        assert!(matches!(err, BlockchainError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NODE_ADDRESS", "0.0.0.0:4000"),
            ("NODE_PEERS", "127.0.0.1:4001, 127.0.0.1:4002,"),
            ("NODE_PRIVATE_NETWORK", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.node_addr, "0.0.0.0:4000");
        assert_eq!(config.peers, vec!["127.0.0.1:4001", "127.0.0.1:4002"]);
        assert!(config.network.private_network);
    }

    #[test]
    fn test_bad_private_flag() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "NODE_PRIVATE_NETWORK").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }
}
