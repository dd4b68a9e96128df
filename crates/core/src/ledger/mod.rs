//! Ledger unit of work: atomic batches, versioned updates and conflict retry.

mod ledger_model;
mod ledger_traits;

pub use ledger_model::{
    ChainConfirmation, ConfirmationResult, LedgerBatch, LedgerConfig, VersionedUpdate,
};
pub use ledger_traits::{retry_on_conflict, LedgerStoreTrait};
