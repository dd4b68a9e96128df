use diesel::prelude::*;
use std::str::FromStr;

use vaultledger_core::transactions::{SavingsTransaction, TransactionStatus, TransactionType};
use vaultledger_core::{Error, Result};

use crate::utils::{
    format_decimal, format_timestamp, parse_decimal, parse_decimal_opt, parse_timestamp,
    parse_timestamp_opt,
};

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::savings_transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SavingsTransactionDB {
    pub id: String,
    pub user_id: String,
    pub goal_id: Option<String>,
    pub group_goal_id: Option<String>,
    pub from_goal_id: Option<String>,
    pub to_goal_id: Option<String>,
    pub transaction_type: String,
    pub status: String,
    pub amount: String,
    pub token_address: String,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub vault_address: Option<String>,
    pub deposit_id: Option<String>,
    pub shares: Option<String>,
    pub lock_tier: Option<i32>,
    pub block_number: Option<i64>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub confirmed_at: Option<String>,
}

impl From<&SavingsTransaction> for SavingsTransactionDB {
    fn from(tx: &SavingsTransaction) -> Self {
        Self {
            id: tx.id.clone(),
            user_id: tx.user_id.clone(),
            goal_id: tx.goal_id.clone(),
            group_goal_id: tx.group_goal_id.clone(),
            from_goal_id: tx.from_goal_id.clone(),
            to_goal_id: tx.to_goal_id.clone(),
            transaction_type: tx.transaction_type.as_str().to_string(),
            status: tx.status.as_str().to_string(),
            amount: format_decimal(tx.amount),
            token_address: tx.token_address.clone(),
            tx_hash: tx.tx_hash.clone(),
            wallet_address: tx.wallet_address.clone(),
            vault_address: tx.vault_address.clone(),
            deposit_id: tx.deposit_id.clone(),
            shares: tx.shares.map(format_decimal),
            lock_tier: tx.lock_tier,
            block_number: tx.block_number,
            failure_reason: tx.failure_reason.clone(),
            created_at: format_timestamp(tx.created_at),
            updated_at: format_timestamp(tx.updated_at),
            confirmed_at: tx.confirmed_at.map(format_timestamp),
        }
    }
}

impl TryFrom<SavingsTransactionDB> for SavingsTransaction {
    type Error = Error;

    fn try_from(db: SavingsTransactionDB) -> Result<Self> {
        Ok(Self {
            transaction_type: TransactionType::from_str(&db.transaction_type)?,
            status: TransactionStatus::from_str(&db.status)?,
            amount: parse_decimal("savings_transactions.amount", &db.amount)?,
            shares: parse_decimal_opt("savings_transactions.shares", db.shares.as_deref())?,
            created_at: parse_timestamp("savings_transactions.created_at", &db.created_at)?,
            updated_at: parse_timestamp("savings_transactions.updated_at", &db.updated_at)?,
            confirmed_at: parse_timestamp_opt(
                "savings_transactions.confirmed_at",
                db.confirmed_at.as_deref(),
            )?,
            id: db.id,
            user_id: db.user_id,
            goal_id: db.goal_id,
            group_goal_id: db.group_goal_id,
            from_goal_id: db.from_goal_id,
            to_goal_id: db.to_goal_id,
            token_address: db.token_address,
            tx_hash: db.tx_hash,
            wallet_address: db.wallet_address,
            vault_address: db.vault_address,
            deposit_id: db.deposit_id,
            lock_tier: db.lock_tier,
            block_number: db.block_number,
            failure_reason: db.failure_reason,
        })
    }
}
