//! Key material and its hex encoding
//!
//! Keys travel over the wire and into storage as lowercase hex strings. [`KeyMaterial`]
//! keeps track of what the bytes are so a private key can never end up where a
//! public key is expected, and the serde helper modules below are the only path
//! between the hex form and the typed form.

use data_encoding::HEXLOWER;
use std::fmt;

use crate::error::{BlockchainError, Result};
use crate::utils::crypto::{address_from_public_key, public_key_from_pkcs8};

/// Length of an uncompressed SEC1 P-256 point
pub const PUBLIC_KEY_LEN: usize = 65;

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum KeyMaterial {
    /// Uncompressed SEC1 P-256 point (`0x04 ∥ x ∥ y`)
    Public(Vec<u8>),
    /// PKCS#8 v1 document holding a P-256 key pair
    Private(Vec<u8>),
}

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyMaterial::Public(bytes) | KeyMaterial::Private(bytes) => bytes,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, KeyMaterial::Public(_))
    }

    pub fn encode(&self) -> String {
        HEXLOWER.encode(self.as_bytes())
    }

    pub fn decode_public(hex: &str) -> Result<KeyMaterial> {
        let bytes = decode_hex(hex)?;
        if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != 0x04 {
            return Err(BlockchainError::Crypto(format!(
                "Expected a {PUBLIC_KEY_LEN}-byte uncompressed P-256 key, got {} bytes",
                bytes.len()
            )));
        }
        Ok(KeyMaterial::Public(bytes))
    }

    pub fn decode_private(hex: &str) -> Result<KeyMaterial> {
        let bytes = decode_hex(hex)?;
        // parse once so a bad document fails here rather than at signing time
        public_key_from_pkcs8(&bytes)?;
        Ok(KeyMaterial::Private(bytes))
    }

    /// Public half of this key. For a private key this derives it from the PKCS#8 document.
    pub fn to_public(&self) -> Result<KeyMaterial> {
        match self {
            KeyMaterial::Public(_) => Ok(self.clone()),
            KeyMaterial::Private(pkcs8) => Ok(KeyMaterial::Public(public_key_from_pkcs8(pkcs8)?)),
        }
    }

    pub fn address(&self) -> Result<String> {
        match self {
            KeyMaterial::Public(bytes) => Ok(address_from_public_key(bytes)),
            KeyMaterial::Private(_) => self.to_public()?.address(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Public(_) => write!(f, "Public({})", self.encode()),
            KeyMaterial::Private(_) => write!(f, "Private(<redacted>)"),
        }
    }
}

pub fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    HEXLOWER
        .decode(hex.to_ascii_lowercase().as_bytes())
        .map_err(|e| BlockchainError::Serialization(format!("Invalid hex encoding: {e}")))
}

/// Serde adapter for an optional public key. Absent keys are written as `null`;
/// both `null` and the empty string read back as `None`.
pub mod public_key_hex {
    use super::KeyMaterial;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        key: &Option<KeyMaterial>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => serializer.serialize_some(&key.encode()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<KeyMaterial>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(hex) if !hex.is_empty() => KeyMaterial::decode_public(&hex)
                .map(Some)
                .map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

/// Serde adapter for optional raw bytes (signatures), same conventions as [`public_key_hex`].
pub mod bytes_hex {
    use super::decode_hex;
    use data_encoding::HEXLOWER;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&HEXLOWER.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(hex) if !hex.is_empty() => decode_hex(&hex).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::new_key_pair;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Holder {
        #[serde(with = "public_key_hex", default)]
        key: Option<KeyMaterial>,
        #[serde(with = "bytes_hex", default)]
        sig: Option<Vec<u8>>,
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let private = KeyMaterial::Private(new_key_pair().unwrap());
        let public = private.to_public().unwrap();
        let decoded = KeyMaterial::decode_public(&public.encode()).unwrap();
        assert_eq!(decoded, public);
        assert_eq!(decoded.address().unwrap(), private.address().unwrap());
    }

    #[test]
    fn test_decode_public_rejects_wrong_length() {
        assert!(KeyMaterial::decode_public("0401").is_err());
        assert!(KeyMaterial::decode_public("zz").is_err());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let private = KeyMaterial::Private(new_key_pair().unwrap());
        assert_eq!(format!("{private:?}"), "Private(<redacted>)");
    }

    #[test]
    fn test_serde_adapters_accept_empty_and_null() {
        let holder: Holder = serde_json::from_str(r#"{"key": "", "sig": null}"#).unwrap();
        assert_eq!(holder, Holder { key: None, sig: None });

        let holder: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(holder, Holder { key: None, sig: None });

        let holder = Holder {
            key: None,
            sig: Some(vec![0xde, 0xad]),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"key":null,"sig":"dead"}"#);
    }
}
