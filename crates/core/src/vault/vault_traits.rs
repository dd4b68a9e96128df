use async_trait::async_trait;

use super::vault_model::{AuditStatus, RawVaultLog, ScanCheckpoint, VaultAuditRecord, VaultEventKind};
use crate::errors::Result;

/// Read access to the chain. Implementations report transport problems as
/// `Error::ExternalFetchFailure` so the scanner knows to retry them.
#[async_trait]
pub trait VaultEventSource: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Logs of one event kind emitted by `vault_address` in
    /// `from_block..=to_block`.
    async fn fetch_logs(
        &self,
        vault_address: &str,
        kind: VaultEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawVaultLog>>;
}

/// Append-only store of every normalized event.
#[async_trait]
pub trait VaultAuditRepositoryTrait: Send + Sync {
    /// Inserts records whose event id is not stored yet and leaves existing
    /// rows untouched. Returns the number of new rows.
    async fn record_events(&self, records: Vec<VaultAuditRecord>) -> Result<usize>;
    fn get_event(&self, event_id: &str) -> Result<Option<VaultAuditRecord>>;
    /// Rows with `status`, optionally for one vault, in chain order.
    fn list_by_status(
        &self,
        status: AuditStatus,
        vault_address: Option<&str>,
    ) -> Result<Vec<VaultAuditRecord>>;
    /// Orphaned rows of one vault carrying this (normalized) tx hash, in
    /// chain order.
    fn list_orphans_by_tx_hash(
        &self,
        vault_address: &str,
        tx_hash: &str,
    ) -> Result<Vec<VaultAuditRecord>>;
    /// Most recent rows for a vault, newest first.
    fn list_events(
        &self,
        network: &str,
        vault_address: &str,
        limit: i64,
    ) -> Result<Vec<VaultAuditRecord>>;
}

#[async_trait]
pub trait CheckpointRepositoryTrait: Send + Sync {
    fn get_checkpoint(&self, network: &str, vault_address: &str) -> Result<Option<ScanCheckpoint>>;
    /// Stores `max(current, block)` and returns the stored checkpoint.
    async fn advance_checkpoint(
        &self,
        network: &str,
        vault_address: &str,
        block: u64,
    ) -> Result<ScanCheckpoint>;
}
