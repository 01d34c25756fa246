//! Wallet key handling
//!
//! A wallet is a key pair plus its address. It signs transfers for
//! submission and signs blocks when its owner produces under proof-of-stake.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::Wallet;
