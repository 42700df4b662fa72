//! The bridge between the local store and the external ledger.
//!
//! The store is authoritative for every voter-facing answer; the ledger is a
//! mirror. Nothing here runs inside the transaction or request that
//! persisted the entity being mirrored.

mod bridge;
mod client;
mod retrier;

pub use bridge::LedgerBridge;
pub use client::{LedgerClient, SubmitReceipt};
pub use retrier::{SyncRetrier, SyncRetrierFairing};
