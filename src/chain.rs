//! Contract of the blockchain reader collaborator.
//!
//! The renting contract ABI and the RPC wire format live with the deployment;
//! the reconciliation engine only needs to ask whether a transaction is mined
//! and what renting events it emitted once decoded.

use std::collections::HashMap;

/// Failure talking to the chain endpoint. Always transient from the engine's
/// point of view: the poller retries on the next tick and never converts it
/// into a permanent transaction failure.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("blockchain endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Renting-offer events a mined transaction can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferEventKind {
    Created,
    Updated,
    Deleted,
    Acquired,
}

/// Lease events a mined transaction can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseEventKind {
    Acquired,
    RentPaid,
    Ended,
}

/// Decoded on-chain offer state attached to an offer event.
#[derive(Debug, Clone, Default)]
pub struct OfferEventState {
    pub offer_id: i64,
    pub nft_id: i64,
    pub creator: String,
    pub block_number: i64,
}

/// Decoded on-chain lease state attached to a lease event.
#[derive(Debug, Clone, Default)]
pub struct LeaseEventState {
    pub lease_id: i64,
    pub nft_id: i64,
    pub tenant: String,
    pub paid_months: i32,
    pub paid_rents_date_seconds: i64,
    pub lease_end_date_seconds: i64,
    pub notice_date_seconds: i64,
    pub block_number: i64,
}

/// Read-only view of the chain consumed by the reconciliation poller.
///
/// An empty event map for a mined transaction means the transaction emitted
/// nothing this engine can decode, which is a permanent failure for that
/// hash.
pub trait BlockchainReader: Send + Sync {
    fn is_transaction_mined(&self, transaction_hash: &str) -> Result<bool, ChainError>;

    fn offer_transaction_events(
        &self,
        transaction_hash: &str,
    ) -> Result<HashMap<OfferEventKind, OfferEventState>, ChainError>;

    fn lease_transaction_events(
        &self,
        transaction_hash: &str,
    ) -> Result<HashMap<LeaseEventKind, LeaseEventState>, ChainError>;
}
