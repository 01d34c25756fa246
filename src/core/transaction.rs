// This file implements transactions - signed value transfers between addresses
// Balances are not stored anywhere; they come from replaying these over the whole chain,
// so the id and signature here are what keeps the ledger honest

use crate::core::monetary::TREASURY_ADDRESS;
use crate::error::{BlockchainError, Result};
use crate::utils::keys::{bytes_hex, public_key_hex};
use crate::utils::{
    current_timestamp, ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify, sha256_hex, KeyMaterial,
};
use serde::{Deserialize, Serialize};

// Amounts go into the hash preimage as the shortest round-tripping decimal with a
// fractional part ("50.0", "4.5"), so every node renders the same bytes
fn format_amount(amount: f64) -> String {
    format!("{amount:?}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "transactionId")]
    id: String,
    #[serde(with = "public_key_hex", default)]
    sender: Option<KeyMaterial>,
    #[serde(with = "public_key_hex", default)]
    recipient: Option<KeyMaterial>,
    #[serde(default)]
    sender_address: String,
    recipient_address: String,
    value: f64,
    fee: f64,
    #[serde(rename = "timeStamp")]
    timestamp: i64,
    #[serde(with = "bytes_hex", default)]
    signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Unsigned transfer between two key holders. Call [`Transaction::sign`] before submitting.
    pub fn new(
        sender: &KeyMaterial,
        recipient: &KeyMaterial,
        value: f64,
        fee: f64,
    ) -> Result<Transaction> {
        let recipient = recipient.to_public()?;
        let recipient_address = recipient.address()?;
        Self::build(
            Some(sender.to_public()?),
            Some(recipient),
            recipient_address,
            value,
            fee,
        )
    }

    /// Unsigned transfer to a bare address (no recipient key known).
    pub fn new_to_address(
        sender: &KeyMaterial,
        recipient_address: &str,
        value: f64,
        fee: f64,
    ) -> Result<Transaction> {
        Self::build(
            Some(sender.to_public()?),
            None,
            recipient_address.to_string(),
            value,
            fee,
        )
    }

    // The coinbase keeps the recipient's key: PoS validation needs it to check the
    // validator signature
    pub fn new_coinbase(recipient: &KeyMaterial, value: f64) -> Result<Transaction> {
        let recipient = recipient.to_public()?;
        let recipient_address = recipient.address()?;
        Self::build(None, Some(recipient), recipient_address, value, 0.0)
    }

    pub fn new_treasury(value: f64) -> Result<Transaction> {
        Self::build(None, None, TREASURY_ADDRESS.to_string(), value, 0.0)
    }

    /// Moves a payout to `timestamp` and rehashes it. Signed transfers are left alone,
    /// since changing their timestamp would void the signature.
    pub fn stamped_at(mut self, timestamp: i64) -> Transaction {
        if self.is_coinbase() {
            self.timestamp = timestamp;
            self.id = self.calculate_hash();
        }
        self
    }

    fn build(
        sender: Option<KeyMaterial>,
        recipient: Option<KeyMaterial>,
        recipient_address: String,
        value: f64,
        fee: f64,
    ) -> Result<Transaction> {
        let sender_address = match &sender {
            Some(key) => key.address()?,
            None => String::new(),
        };
        let mut tx = Transaction {
            id: String::new(),
            sender,
            recipient,
            sender_address,
            recipient_address,
            value,
            fee,
            timestamp: current_timestamp()?,
            signature: None,
        };
        tx.id = tx.calculate_hash();
        Ok(tx)
    }

    fn signing_data(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.sender_address,
            self.recipient_address,
            format_amount(self.value),
            format_amount(self.fee),
            self.timestamp
        )
    }

    pub fn calculate_hash(&self) -> String {
        sha256_hex(&self.signing_data())
    }

    pub fn sign(&mut self, private_key: &KeyMaterial) -> Result<()> {
        let pkcs8 = match private_key {
            KeyMaterial::Private(pkcs8) => pkcs8,
            KeyMaterial::Public(_) => {
                return Err(BlockchainError::Crypto(
                    "Signing requires a private key".to_string(),
                ))
            }
        };
        let signer = private_key.to_public()?;
        if self.sender.as_ref() != Some(&signer) {
            return Err(BlockchainError::Crypto(format!(
                "Key does not belong to the sender of transaction {}",
                self.id
            )));
        }
        self.signature = Some(ecdsa_p256_sha256_sign(
            pkcs8,
            self.signing_data().as_bytes(),
        )?);
        Ok(())
    }

    /// Checks the signature and that the addresses belong to the keys they sit next to.
    /// Sender-less (coinbase and treasury) transactions carry no signature and always pass.
    pub fn verify_signature(&self) -> bool {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return true,
        };
        if !sender.is_public() {
            return false;
        }
        if sender.address().ok().as_deref() != Some(self.sender_address.as_str()) {
            log::debug!("Transaction {} sender address does not match its key", self.id);
            return false;
        }
        if let Some(recipient) = &self.recipient {
            if recipient.address().ok().as_deref() != Some(self.recipient_address.as_str()) {
                log::debug!(
                    "Transaction {} recipient address does not match its key",
                    self.id
                );
                return false;
            }
        }
        match &self.signature {
            Some(signature) => ecdsa_p256_sha256_verify(
                sender.as_bytes(),
                signature,
                self.signing_data().as_bytes(),
            ),
            None => false,
        }
    }

    pub fn has_valid_id(&self) -> bool {
        self.id == self.calculate_hash()
    }

    // Only the consensus engine creates these
    pub fn is_coinbase(&self) -> bool {
        self.sender.is_none()
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_sender(&self) -> Option<&KeyMaterial> {
        self.sender.as_ref()
    }

    pub fn get_recipient(&self) -> Option<&KeyMaterial> {
        self.recipient.as_ref()
    }

    pub fn get_sender_address(&self) -> &str {
        self.sender_address.as_str()
    }

    pub fn get_recipient_address(&self) -> &str {
        self.recipient_address.as_str()
    }

    pub fn get_value(&self) -> f64 {
        self.value
    }

    pub fn get_fee(&self) -> f64 {
        self.fee
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }
}
