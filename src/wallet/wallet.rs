use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::KeyMaterial;

/// A P-256 key pair that can sign transfers and blocks. Nothing is written to disk;
/// `encode_private_key` / `from_private_key_hex` are the only way to carry one around.
#[derive(Clone, Debug)]
pub struct Wallet {
    private_key: KeyMaterial,
    public_key: KeyMaterial,
    address: String,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = crate::utils::new_key_pair()?;
        Self::from_private_key(KeyMaterial::Private(pkcs8))
    }

    pub fn from_private_key(private_key: KeyMaterial) -> Result<Wallet> {
        if private_key.is_public() {
            return Err(BlockchainError::Wallet(
                "A wallet needs a private key".to_string(),
            ));
        }
        let public_key = private_key.to_public()?;
        let address = public_key.address()?;
        Ok(Wallet {
            private_key,
            public_key,
            address,
        })
    }

    pub fn from_private_key_hex(hex: &str) -> Result<Wallet> {
        let private_key = KeyMaterial::decode_private(hex.trim())
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key: {e}")))?;
        Self::from_private_key(private_key)
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_public_key(&self) -> &KeyMaterial {
        &self.public_key
    }

    pub fn get_private_key(&self) -> &KeyMaterial {
        &self.private_key
    }

    pub fn encode_private_key(&self) -> String {
        self.private_key.encode()
    }

    /// Signed transfer to another key holder
    pub fn send_funds(&self, recipient: &KeyMaterial, value: f64, fee: f64) -> Result<Transaction> {
        let mut tx = Transaction::new(&self.public_key, recipient, value, fee)?;
        tx.sign(&self.private_key)?;
        Ok(tx)
    }

    /// Signed transfer to a bare address
    pub fn send_to_address(&self, address: &str, value: f64, fee: f64) -> Result<Transaction> {
        let mut tx = Transaction::new_to_address(&self.public_key, address, value, fee)?;
        tx.sign(&self.private_key)?;
        Ok(tx)
    }
}
