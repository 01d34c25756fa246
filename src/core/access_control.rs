// Who may produce blocks. On a public network anyone can; on a private network
// only allow-listed validator addresses can

use crate::config::NetworkConfig;
use log::info;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct AccessControlManager {
    network: NetworkConfig,
    validators: BTreeSet<String>,
}

impl AccessControlManager {
    pub fn new(network: NetworkConfig) -> AccessControlManager {
        AccessControlManager {
            network,
            validators: BTreeSet::new(),
        }
    }

    pub fn with_validators<I, S>(network: NetworkConfig, validators: I) -> AccessControlManager
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessControlManager {
            network,
            validators: validators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get_network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn is_private_network(&self) -> bool {
        self.network.private_network
    }

    pub fn set_private_network(&mut self, private_network: bool) {
        self.network.private_network = private_network;
        info!(
            "Network mode set to {}",
            if private_network { "private" } else { "public" }
        );
    }

    pub fn add_validator(&mut self, address: &str) {
        if self.validators.insert(address.to_string()) {
            info!("Validator {address} added to the allow-list");
        }
    }

    pub fn remove_validator(&mut self, address: &str) -> bool {
        self.validators.remove(address)
    }

    pub fn is_validator_allowed(&self, address: &str) -> bool {
        !self.network.private_network || self.validators.contains(address)
    }

    pub fn get_validators(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(String::as_str)
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_network() -> NetworkConfig {
        NetworkConfig {
            private_network: true,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_public_network_allows_everyone() {
        let acl = AccessControlManager::new(NetworkConfig::default());
        assert!(acl.is_validator_allowed("anyone"));
    }

    #[test]
    fn test_private_network_uses_allow_list() {
        let mut acl = AccessControlManager::new(private_network());
        assert!(!acl.is_validator_allowed("x"));

        acl.add_validator("x");
        assert!(acl.is_validator_allowed("x"));
        assert!(!acl.is_validator_allowed("y"));

        assert!(acl.remove_validator("x"));
        assert!(!acl.is_validator_allowed("x"));
    }

    #[test]
    fn test_switching_modes() {
        let mut acl = AccessControlManager::with_validators(NetworkConfig::default(), ["x"]);
        assert!(acl.is_validator_allowed("y"));
        acl.set_private_network(true);
        assert!(!acl.is_validator_allowed("y"));
        assert!(acl.is_validator_allowed("x"));
        assert_eq!(acl.get_validators().collect::<Vec<_>>(), vec!["x"]);
    }
}
