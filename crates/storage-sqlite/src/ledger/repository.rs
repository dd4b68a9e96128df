use async_trait::async_trait;
use diesel::SqliteConnection;
use log::debug;

use vaultledger_core::ledger::{LedgerBatch, LedgerStoreTrait};
use vaultledger_core::Result;

use crate::db::WriteHandle;
use crate::{goals, group_goals, transactions, vault_events};

/// Applies a whole ledger batch in one immediate transaction on the writer
/// connection. Any stale version, status or audit row rolls back everything.
pub struct SqliteLedgerStore {
    writer: WriteHandle,
}

impl SqliteLedgerStore {
    pub fn new(writer: WriteHandle) -> Self {
        SqliteLedgerStore { writer }
    }
}

#[async_trait]
impl LedgerStoreTrait for SqliteLedgerStore {
    async fn commit(&self, batch: LedgerBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                for update in &batch.goal_updates {
                    goals::repository::update_versioned(conn, update)?;
                }
                for update in &batch.group_goal_updates {
                    group_goals::repository::update_versioned(conn, update)?;
                }
                for transaction in &batch.new_transactions {
                    transactions::repository::insert(conn, transaction)?;
                }
                for update in &batch.transaction_updates {
                    transactions::repository::update_with_expected_status(conn, update)?;
                }
                for audit_match in &batch.audit_matches {
                    vault_events::repository::mark_matched(conn, audit_match)?;
                }
                debug!(
                    "Committed ledger batch: {} goals, {} group goals, {} new transactions, {} transaction updates, {} audit matches",
                    batch.goal_updates.len(),
                    batch.group_goal_updates.len(),
                    batch.new_transactions.len(),
                    batch.transaction_updates.len(),
                    batch.audit_matches.len()
                );
                Ok(())
            })
            .await
    }
}
