//! Off-chain service layer of the Deed renting marketplace.
//!
//! Owners list NFT-backed Deed properties for rent, managers acquire leases,
//! and every legal or financial state change settles on chain while this
//! crate keeps a fast, queryable off-chain index in sync. Records are written
//! optimistically ahead of confirmation; the reconciliation poller watches
//! pending transactions and merges or rolls back state once they are mined.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod leases;
pub mod listeners;
pub mod models;
pub mod offers;
pub mod period;
pub mod poller;
pub mod rewards;
pub mod schema;
pub mod store;
