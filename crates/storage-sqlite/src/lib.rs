//! SQLite storage implementation for Vaultledger.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `vaultledger-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - Repository implementations for goals, group goals, transactions,
//!   the vault audit log and scan checkpoints
//! - The atomic ledger store used by the engines and the reconciler
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//! `core` is database-agnostic and works with traits.
//!
//! ```text
//! core (domain)          chain (event source)
//!       │
//!       ▼
//! storage-sqlite (this crate)
//!       │
//!       ▼
//!   SQLite DB
//! ```
//!
//! All writes are serialized through a single writer connection
//! ([`WriteHandle`]); each write job runs in its own immediate transaction.

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod checkpoints;
pub mod goals;
pub mod group_goals;
pub mod ledger;
pub mod transactions;
pub mod vault_events;

#[cfg(test)]
mod testing;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use checkpoints::CheckpointRepository;
pub use goals::GoalRepository;
pub use group_goals::GroupGoalRepository;
pub use ledger::SqliteLedgerStore;
pub use transactions::SavingsTransactionRepository;
pub use vault_events::VaultAuditRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from vaultledger-core for convenience
pub use vaultledger_core::errors::{DatabaseError, Error, Result};
