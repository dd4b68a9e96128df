use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use vaultledger_core::transactions::{
    SavingsTransaction, SavingsTransactionRepositoryTrait, TransactionStatus, TransactionUpdate,
};
use vaultledger_core::{Error, Result};

use super::model::SavingsTransactionDB;
use crate::db::get_connection;
use crate::errors::IntoCore;
use crate::schema::savings_transactions;
use crate::schema::savings_transactions::dsl::*;

/// Read side of the transaction log. Inserts and status changes are applied
/// by the ledger store together with the balances they move.
pub struct SavingsTransactionRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
}

impl SavingsTransactionRepository {
    pub fn new(pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>) -> Self {
        SavingsTransactionRepository { pool }
    }
}

pub(crate) fn insert(conn: &mut SqliteConnection, transaction: &SavingsTransaction) -> Result<()> {
    diesel::insert_into(savings_transactions::table)
        .values(SavingsTransactionDB::from(transaction))
        .execute(conn)
        .into_core()?;
    Ok(())
}

/// Rewrites a transaction only while it still has the expected status, so a
/// confirmation and a failure racing on the same entry cannot both land.
pub(crate) fn update_with_expected_status(
    conn: &mut SqliteConnection,
    update: &TransactionUpdate,
) -> Result<()> {
    let row = SavingsTransactionDB::from(&update.transaction);
    let affected = diesel::update(
        savings_transactions
            .filter(id.eq(&row.id))
            .filter(status.eq(update.expected_status.as_str())),
    )
    .set(&row)
    .execute(conn)
    .into_core()?;
    if affected == 1 {
        return Ok(());
    }
    let exists = savings_transactions
        .filter(id.eq(&row.id))
        .count()
        .get_result::<i64>(conn)
        .into_core()?
        > 0;
    if exists {
        Err(Error::conflict("transaction", row.id))
    } else {
        Err(Error::not_found("transaction", row.id))
    }
}

fn into_domain(rows: Vec<SavingsTransactionDB>) -> Result<Vec<SavingsTransaction>> {
    rows.into_iter().map(SavingsTransaction::try_from).collect()
}

impl SavingsTransactionRepositoryTrait for SavingsTransactionRepository {
    fn get_transaction(&self, transaction_id: &str) -> Result<SavingsTransaction> {
        let mut conn = get_connection(&self.pool)?;
        savings_transactions
            .find(transaction_id)
            .select(SavingsTransactionDB::as_select())
            .first::<SavingsTransactionDB>(&mut conn)
            .optional()
            .into_core()?
            .ok_or_else(|| Error::not_found("transaction", transaction_id))
            .and_then(SavingsTransaction::try_from)
    }

    fn list_for_goal(&self, target_goal_id: &str) -> Result<Vec<SavingsTransaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = savings_transactions
            .filter(
                goal_id
                    .eq(target_goal_id)
                    .or(from_goal_id.eq(target_goal_id))
                    .or(to_goal_id.eq(target_goal_id)),
            )
            .order((created_at.asc(), id.asc()))
            .select(SavingsTransactionDB::as_select())
            .load::<SavingsTransactionDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }

    fn list_for_group_goal(&self, target_group_goal_id: &str) -> Result<Vec<SavingsTransaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = savings_transactions
            .filter(group_goal_id.eq(target_group_goal_id))
            .order((created_at.asc(), id.asc()))
            .select(SavingsTransactionDB::as_select())
            .load::<SavingsTransactionDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }

    fn list_pending_by_tx_hash(&self, hash: &str) -> Result<Vec<SavingsTransaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = savings_transactions
            .filter(tx_hash.eq(hash))
            .filter(status.eq(TransactionStatus::Pending.as_str()))
            .order((created_at.asc(), id.asc()))
            .select(SavingsTransactionDB::as_select())
            .load::<SavingsTransactionDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }

    fn list_pending_tx_hashes(&self, vault: &str) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let hashes = savings_transactions
            .filter(vault_address.eq(vault))
            .filter(status.eq(TransactionStatus::Pending.as_str()))
            .filter(tx_hash.is_not_null())
            .select(tx_hash)
            .distinct()
            .order(tx_hash.asc())
            .load::<Option<String>>(&mut conn)
            .into_core()?;
        Ok(hashes.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::GoalRepository;
    use crate::ledger::SqliteLedgerStore;
    use crate::testing::{goal, setup};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use vaultledger_core::goals::GoalRepositoryTrait;
    use vaultledger_core::ledger::{LedgerBatch, LedgerStoreTrait};
    use vaultledger_core::transactions::TransactionType;

    fn pending(kind: TransactionType, hash: &str) -> SavingsTransaction {
        let mut tx = SavingsTransaction::new(
            "alice",
            kind,
            TransactionStatus::Pending,
            dec!(100),
            "0xusdc",
            Utc::now(),
        )
        .for_goal("g1");
        tx.tx_hash = Some(hash.to_string());
        tx
    }

    #[tokio::test]
    async fn test_inserted_transactions_are_listed_per_goal() {
        let db = setup();
        let repo = SavingsTransactionRepository::new(db.pool.clone());
        let store = SqliteLedgerStore::new(db.writer.clone());

        let deposit = pending(TransactionType::Deposit, "0xaa");
        let transfer = SavingsTransaction::new(
            "alice",
            TransactionType::Transfer,
            TransactionStatus::Confirmed,
            dec!(5),
            "0xusdc",
            Utc::now(),
        )
        .between_goals("g2", "g1");
        let mut batch = LedgerBatch::new();
        batch.insert_transaction(deposit.clone());
        batch.insert_transaction(transfer.clone());
        store.commit(batch).await.unwrap();

        assert_eq!(repo.get_transaction(&deposit.id).unwrap(), deposit);
        assert_eq!(repo.list_for_goal("g1").unwrap().len(), 2);
        assert_eq!(repo.list_for_goal("g2").unwrap().len(), 1);
        assert!(repo.list_for_group_goal("g1").unwrap().is_empty());
        assert_eq!(repo.list_pending_by_tx_hash("0xaa").unwrap().len(), 1);
        assert!(repo.list_pending_by_tx_hash("0xbb").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_tx_hashes_are_distinct_per_vault() {
        let db = setup();
        let repo = SavingsTransactionRepository::new(db.pool.clone());
        let store = SqliteLedgerStore::new(db.writer.clone());
        let in_vault = |hash: &str, vault: &str| {
            let mut tx = pending(TransactionType::Deposit, hash);
            tx.vault_address = Some(vault.to_string());
            tx
        };
        let mut confirmed = in_vault("0xcc", "0xvault");
        confirmed.status = TransactionStatus::Confirmed;
        let mut unsubmitted = in_vault("0xdd", "0xvault");
        unsubmitted.tx_hash = None;
        let mut batch = LedgerBatch::new();
        for tx in [
            in_vault("0xbb", "0xvault"),
            in_vault("0xaa", "0xvault"),
            in_vault("0xaa", "0xvault"),
            in_vault("0xee", "0xother"),
            confirmed,
            unsubmitted,
        ] {
            batch.insert_transaction(tx);
        }
        store.commit(batch).await.unwrap();

        assert_eq!(repo.list_pending_tx_hashes("0xvault").unwrap(), vec!["0xaa", "0xbb"]);
        assert_eq!(repo.list_pending_tx_hashes("0xother").unwrap(), vec!["0xee"]);
        assert!(repo.list_pending_tx_hashes("0xnone").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_guard_rolls_back_the_whole_batch() {
        let db = setup();
        let repo = SavingsTransactionRepository::new(db.pool.clone());
        let goals = GoalRepository::new(db.pool.clone(), db.writer.clone());
        let store = SqliteLedgerStore::new(db.writer.clone());
        let stored_goal = goals.insert_goal(goal("g1", "alice", false)).await.unwrap();
        let deposit = pending(TransactionType::Deposit, "0xaa");
        let mut batch = LedgerBatch::new();
        batch.insert_transaction(deposit.clone());
        store.commit(batch).await.unwrap();

        // Failing a transaction that is still pending succeeds.
        let mut failed = deposit.clone();
        failed.transition(TransactionStatus::Failed, Utc::now()).unwrap();
        let mut batch = LedgerBatch::new();
        batch.update_transaction(failed.clone(), TransactionStatus::Pending);
        store.commit(batch).await.unwrap();

        // A confirmation built from the stale pending copy must not land,
        // and neither may the balance change committed with it.
        let mut confirmed = deposit.clone();
        confirmed.transition(TransactionStatus::Confirmed, Utc::now()).unwrap();
        let mut credited = stored_goal.clone();
        credited.credit(dec!(100)).unwrap();
        let mut batch = LedgerBatch::new();
        batch.update_goal(credited, Utc::now());
        batch.update_transaction(confirmed, TransactionStatus::Pending);
        assert!(store.commit(batch).await.unwrap_err().is_conflict());

        assert_eq!(
            repo.get_transaction(&deposit.id).unwrap().status,
            TransactionStatus::Failed
        );
        assert_eq!(goals.get_goal("g1").unwrap().current_amount, dec!(0));
        assert!(repo.list_pending_by_tx_hash("0xaa").unwrap().is_empty());
    }
}
