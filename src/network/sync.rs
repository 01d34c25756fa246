//! Gossip and fork resolution
//!
//! [`handle_message`] is the whole protocol: it takes one inbound message, applies
//! it to the ledger, and says what should go back out. The connection layer
//! only has to deliver the returned [`Outbound`] actions.

use crate::core::{Block, Blockchain};
use crate::error::{BlockchainError, Result};
use crate::network::{Message, MessageType};
use log::{debug, info, warn};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Send back to the peer the message came from
    Reply(Message),
    /// Send to every connected peer
    Broadcast(Message),
}

pub(crate) fn read_ledger(ledger: &RwLock<Blockchain>) -> Result<RwLockReadGuard<'_, Blockchain>> {
    ledger
        .read()
        .map_err(|e| BlockchainError::Concurrency(format!("Ledger lock poisoned: {e}")))
}

pub(crate) fn write_ledger(
    ledger: &RwLock<Blockchain>,
) -> Result<RwLockWriteGuard<'_, Blockchain>> {
    ledger
        .write()
        .map_err(|e| BlockchainError::Concurrency(format!("Ledger lock poisoned: {e}")))
}

/// Applies one message to the ledger. An `Err` means the payload could not be
/// decoded; rejected blocks and transactions are not errors, they just produce
/// no outbound traffic.
pub fn handle_message(ledger: &RwLock<Blockchain>, message: &Message) -> Result<Vec<Outbound>> {
    match message.kind {
        MessageType::QueryLatest => {
            let chain = read_ledger(ledger)?;
            let head = chain.get_latest_block();
            Ok(vec![Outbound::Reply(Message::response_blockchain(
                std::slice::from_ref(head),
            )?)])
        }
        MessageType::QueryAll => {
            let chain = read_ledger(ledger)?;
            Ok(vec![Outbound::Reply(Message::response_blockchain(
                chain.get_chain(),
            )?)])
        }
        MessageType::ResponseBlockchain => handle_blockchain_response(ledger, message.blocks()?),
        MessageType::BroadcastTransaction => handle_transaction_broadcast(ledger, message),
    }
}

fn handle_blockchain_response(
    ledger: &RwLock<Blockchain>,
    blocks: Vec<Block>,
) -> Result<Vec<Outbound>> {
    let received = match blocks.last() {
        Some(block) => block.clone(),
        None => return Ok(vec![]),
    };

    // decide and apply under one write guard so the head can't move in between
    let mut chain = write_ledger(ledger)?;
    let held = chain.get_latest_block();
    if received.get_index() <= held.get_index() {
        debug!(
            "Received chain (height {}) is not longer than ours (height {}), ignoring",
            received.get_index(),
            held.get_index()
        );
        return Ok(vec![]);
    }

    if held.get_hash() == received.get_previous_hash() {
        let index = received.get_index();
        return match chain.append_block(received.clone()) {
            Ok(()) => Ok(vec![Outbound::Broadcast(Message::response_blockchain(
                &[received],
            )?)]),
            Err(e) => {
                warn!("Discarding received block {index}: {e}");
                Ok(vec![])
            }
        };
    }

    if blocks.len() == 1 {
        info!(
            "Peer is ahead at height {}, requesting its full chain",
            received.get_index()
        );
        return Ok(vec![Outbound::Reply(Message::query_all())]);
    }

    match chain.replace_chain(blocks) {
        Ok(()) => Ok(vec![Outbound::Broadcast(Message::response_blockchain(
            std::slice::from_ref(chain.get_latest_block()),
        )?)]),
        Err(e) => {
            warn!("Rejected received chain: {e}");
            Ok(vec![])
        }
    }
}

fn handle_transaction_broadcast(
    ledger: &RwLock<Blockchain>,
    message: &Message,
) -> Result<Vec<Outbound>> {
    let tx = message.transaction()?;
    let txid = tx.get_id().to_string();
    match write_ledger(ledger)?.add_transaction(tx) {
        Ok(()) => {
            info!("Received and added transaction {txid}");
            Ok(vec![Outbound::Broadcast(message.clone())])
        }
        Err(e) => {
            // known, invalid or unaffordable: dropped without telling the sender
            debug!("Dropped gossiped transaction {txid}: {e}");
            Ok(vec![])
        }
    }
}
