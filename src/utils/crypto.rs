use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING,
};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 rendered as 64 lowercase hex characters. Every hash on the ledger
/// (transaction ids, block hashes, addresses) goes through here.
pub fn sha256_hex(data: &str) -> String {
    HEXLOWER.encode(&sha256_digest(data.as_bytes()))
}

/// An address is the hash of the hex form of the public key, not of the raw bytes.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    sha256_hex(&HEXLOWER.encode(public_key))
}

/// Generates a fresh P-256 key pair and returns it as a PKCS#8 document.
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Invalid PKCS8 document: {e}")))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ecdsa_p256_sha256_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

pub fn ecdsa_p256_sha256_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key);
    peer_public_key.verify(message, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_hex("").len(), 64);
    }

    #[test]
    fn test_sign_and_verify() {
        let pkcs8 = new_key_pair().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        assert_eq!(public_key.len(), 65);

        let signature = ecdsa_p256_sha256_sign(&pkcs8, b"hello").unwrap();
        assert!(ecdsa_p256_sha256_verify(&public_key, &signature, b"hello"));
        assert!(!ecdsa_p256_sha256_verify(&public_key, &signature, b"hellO"));
    }

    #[test]
    fn test_address_is_hash_of_hex_key() {
        let key = [4u8, 1, 2, 3];
        assert_eq!(address_from_public_key(&key), sha256_hex("04010203"));
    }

    #[test]
    fn test_rejects_garbage_pkcs8() {
        assert!(public_key_from_pkcs8(&[1, 2, 3]).is_err());
        assert!(ecdsa_p256_sha256_sign(&[1, 2, 3], b"msg").is_err());
    }
}
