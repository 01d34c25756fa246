// The peer wire format: one JSON envelope per line, {"type": ..., "data": ...}.
// `data` is itself a JSON string - a list of blocks or a single transaction

use crate::core::{Block, Transaction};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    QueryLatest,
    QueryAll,
    ResponseBlockchain,
    BroadcastTransaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub data: String,
}

impl Message {
    pub fn query_latest() -> Message {
        Message {
            kind: MessageType::QueryLatest,
            data: String::new(),
        }
    }

    pub fn query_all() -> Message {
        Message {
            kind: MessageType::QueryAll,
            data: String::new(),
        }
    }

    pub fn response_blockchain(blocks: &[Block]) -> Result<Message> {
        Ok(Message {
            kind: MessageType::ResponseBlockchain,
            data: serde_json::to_string(blocks)?,
        })
    }

    pub fn broadcast_transaction(tx: &Transaction) -> Result<Message> {
        Ok(Message {
            kind: MessageType::BroadcastTransaction,
            data: serde_json::to_string(tx)?,
        })
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(serde_json::from_str(&self.data)?)
    }

    pub fn transaction(&self) -> Result<Transaction> {
        Ok(serde_json::from_str(&self.data)?)
    }

    /// Encodes the envelope as a single line, newline included
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Message> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockchainError;
    use crate::wallet::Wallet;

    #[test]
    fn test_envelope_shape() {
        let line = Message::query_latest().to_line().unwrap();
        assert_eq!(line, "{\"type\":\"QUERY_LATEST\",\"data\":\"\"}\n");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_missing_data_defaults_to_empty() {
        let message = Message::from_line(r#"{"type":"QUERY_ALL"}"#).unwrap();
        assert_eq!(message, Message::query_all());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = Message::from_line(r#"{"type":"GOSSIP","data":""}"#);
        assert!(matches!(result, Err(BlockchainError::Serialization(_))));
        assert!(Message::from_line("not json").is_err());
    }

    #[test]
    fn test_transaction_payload() {
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        let tx = alice.send_funds(bob.get_public_key(), 2.5, 0.1).unwrap();

        let line = Message::broadcast_transaction(&tx).unwrap().to_line().unwrap();
        let decoded = Message::from_line(&line).unwrap();
        assert_eq!(decoded.kind, MessageType::BroadcastTransaction);
        assert_eq!(decoded.transaction().unwrap(), tx);
    }

    #[test]
    fn test_block_list_payload() {
        let genesis = Block::generate_genesis_block(1);
        let message = Message::response_blockchain(std::slice::from_ref(&genesis)).unwrap();
        assert!(message.data.starts_with('['));
        assert_eq!(message.blocks().unwrap(), vec![genesis]);
    }
}
