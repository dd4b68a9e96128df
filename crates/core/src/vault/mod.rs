//! Vault module - chain event normalization, audit trail, reconciliation and
//! checkpointed scanning.

mod normalizer;
mod reconciler;
mod scanner;
mod vault_model;
mod vault_traits;


pub use normalizer::normalize;
pub use reconciler::{ReconcileOutcome, ReconcileSummary, Reconciler};
pub use scanner::{ScanLockRegistry, ScanReport, VaultScanner};
pub use vault_model::{
    AuditMatch, AuditStatus, EventExtra, NormalizedVaultEvent, RawVaultLog, ScanCheckpoint,
    VaultAuditRecord, VaultConfig, VaultEventKind,
};
pub use vault_traits::{CheckpointRepositoryTrait, VaultAuditRepositoryTrait, VaultEventSource};

#[cfg(test)]
pub(crate) use normalizer::test_support;
