//! Error handling for the ledger node
//!
//! Every fallible operation in the crate returns [`Result`]. The first three groups of
//! variants are the admission, block validation and chain replacement failures the ledger
//! reports to its callers; the rest wrap infrastructure failures (storage, sockets, config).

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for ledger, consensus and node operations
#[derive(Debug, Clone, PartialEq)]
pub enum BlockchainError {
    // Transaction admission
    /// Signature missing, malformed, or not matching the sender key
    InvalidSignature(String),
    /// Transaction id does not match the recomputed hash
    InvalidTransactionHash(String),
    /// Value is zero, negative or not a finite number
    NonPositiveValue(f64),
    /// Fee is negative or not a finite number
    NegativeFee(f64),
    /// Transaction id already on chain or in the mempool
    ReplayedTransaction(String),
    /// Spendable balance (after pending commitments and stake) is too low
    InsufficientFunds { required: f64, available: f64 },

    // Block validation
    InvalidBlockIndex { expected: u64, found: u64 },
    InvalidPreviousHash { index: u64 },
    InvalidBlockHash { index: u64 },
    /// PoW target missed or PoS validator signature rejected
    InvalidProof { index: u64, reason: String },
    InvalidEmbeddedTransaction { index: u64, transaction_id: String },

    // Chain replacement
    /// Candidate chain starts from a different genesis block
    GenesisMismatch,
    /// Candidate chain failed validation; `index` is the first offending block
    InvalidChainSegment { index: u64, reason: String },

    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Wallet operation errors
    Wallet(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// A lock guarding shared state was poisoned
    Concurrency(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::InvalidSignature(id) => {
                write!(f, "Invalid signature on transaction {id}")
            }
            BlockchainError::InvalidTransactionHash(id) => {
                write!(f, "Transaction id {id} does not match its contents")
            }
            BlockchainError::NonPositiveValue(value) => {
                write!(f, "Transaction value must be positive, got {value}")
            }
            BlockchainError::NegativeFee(fee) => {
                write!(f, "Transaction fee must not be negative, got {fee}")
            }
            BlockchainError::ReplayedTransaction(id) => {
                write!(f, "Transaction {id} is already known")
            }
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::InvalidBlockIndex { expected, found } => {
                write!(f, "Invalid block index: expected {expected}, found {found}")
            }
            BlockchainError::InvalidPreviousHash { index } => {
                write!(f, "Block {index} does not link to its predecessor")
            }
            BlockchainError::InvalidBlockHash { index } => {
                write!(f, "Block {index} hash does not match its contents")
            }
            BlockchainError::InvalidProof { index, reason } => {
                write!(f, "Block {index} has an invalid proof: {reason}")
            }
            BlockchainError::InvalidEmbeddedTransaction {
                index,
                transaction_id,
            } => {
                write!(
                    f,
                    "Block {index} carries invalid transaction {transaction_id}"
                )
            }
            BlockchainError::GenesisMismatch => {
                write!(f, "Candidate chain has a different genesis block")
            }
            BlockchainError::InvalidChainSegment { index, reason } => {
                write!(f, "Candidate chain rejected at block {index}: {reason}")
            }
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Concurrency(msg) => write!(f, "Lock error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
