// Binary encoding for values stored in sled, via bincode 2's serde bridge
use crate::error::{BlockchainError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::serde::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let config = bincode::config::standard();
    let (data, _) = bincode::serde::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        height: u64,
        hash: String,
        reward: f64,
        validator: Option<String>,
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = Record {
            height: 42,
            hash: "00ab".to_string(),
            reward: 45.0,
            validator: None,
        };

        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: Record = deserialize(&serialized).expect("Deserialization should work");

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Record> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }
}
