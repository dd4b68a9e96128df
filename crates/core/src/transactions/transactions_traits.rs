use crate::errors::Result;
use crate::transactions::transactions_model::SavingsTransaction;

/// Read access to savings transactions. Writes go through the ledger store so
/// they commit atomically with the balances they affect.
pub trait SavingsTransactionRepositoryTrait: Send + Sync {
    fn get_transaction(&self, transaction_id: &str) -> Result<SavingsTransaction>;
    fn list_for_goal(&self, goal_id: &str) -> Result<Vec<SavingsTransaction>>;
    fn list_for_group_goal(&self, group_goal_id: &str) -> Result<Vec<SavingsTransaction>>;
    /// Pending entries carrying this (normalized) chain transaction hash,
    /// oldest first.
    fn list_pending_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<SavingsTransaction>>;
    /// Distinct tx hashes of pending entries submitted to this vault.
    fn list_pending_tx_hashes(&self, vault_address: &str) -> Result<Vec<String>>;
}
