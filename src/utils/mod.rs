//! Utility functions and helpers
//!
//! Hashing, signing, key encoding and the binary codec used by the on-disk store.

pub mod crypto;
pub mod keys;
pub mod serialization;

pub use crypto::{
    address_from_public_key, current_timestamp, ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify,
    new_key_pair, public_key_from_pkcs8, sha256_digest, sha256_hex,
};
pub use keys::KeyMaterial;
pub use serialization::{deserialize, serialize};
