//! Vaultledger Core - Domain entities, services, and traits.
//!
//! Holds the savings ledger (goals, group goals, transactions) and the
//! pipeline that reconciles it against on-chain vault events. It is
//! database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` and `chain` crates.

pub mod constants;
pub mod errors;
pub mod events;
pub mod goals;
pub mod group_goals;
pub mod ledger;
pub mod pricing;
pub mod transactions;
pub mod utils;
pub mod vault;

#[cfg(test)]
mod testing;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
