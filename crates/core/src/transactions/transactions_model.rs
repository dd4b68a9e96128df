//! Savings transaction domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{Error, Result, ValidationError};
use crate::utils::amounts::normalize_address;
use crate::utils::decimal_serde::{amount_serde, amount_serde_option};

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Interest,
    Transfer,
    Contribution,
    Penalty,
    Bonus,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Interest => "interest",
            TransactionType::Transfer => "transfer",
            TransactionType::Contribution => "contribution",
            TransactionType::Penalty => "penalty",
            TransactionType::Bonus => "bonus",
            TransactionType::Refund => "refund",
        }
    }

    /// Entries that move value into a goal and are confirmed by a `Deposited` event.
    pub fn is_inflow(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::Contribution
        )
    }

    /// Entries that move value out of a goal and are confirmed by a `Withdrawn` event.
    pub fn is_outflow(&self) -> bool {
        matches!(self, TransactionType::Withdrawal | TransactionType::Refund)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "interest" => Ok(TransactionType::Interest),
            "transfer" => Ok(TransactionType::Transfer),
            "contribution" => Ok(TransactionType::Contribution),
            "penalty" => Ok(TransactionType::Penalty),
            "bonus" => Ok(TransactionType::Bonus),
            "refund" => Ok(TransactionType::Refund),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown transaction type '{}'",
                other
            ))
            .into()),
        }
    }
}

/// Lifecycle of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Completed,
    Failed,
    Cancelled,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Reversed => "reversed",
        }
    }

    /// Allowed transitions. Completed and failed entries are frozen.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Reversed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            "reversed" => Ok(TransactionStatus::Reversed),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown transaction status '{}'",
                other
            ))
            .into()),
        }
    }
}

/// What the wallet/signing layer hands back when an operation is submitted on chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSubmission {
    pub tx_hash: String,
    pub wallet_address: Option<String>,
    pub vault_address: String,
    /// Known up front for withdrawals (the deposit being redeemed).
    pub deposit_id: Option<String>,
}

impl ChainSubmission {
    pub fn normalized(self) -> Self {
        Self {
            tx_hash: normalize_address(&self.tx_hash),
            wallet_address: self.wallet_address.as_deref().map(normalize_address),
            vault_address: normalize_address(&self.vault_address),
            deposit_id: self.deposit_id.map(|d| d.trim().to_string()),
        }
    }
}

/// Immutable-once-confirmed ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsTransaction {
    pub id: String,
    pub user_id: String,
    pub goal_id: Option<String>,
    pub group_goal_id: Option<String>,
    pub from_goal_id: Option<String>,
    pub to_goal_id: Option<String>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub token_address: String,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub vault_address: Option<String>,
    pub deposit_id: Option<String>,
    #[serde(with = "amount_serde_option")]
    pub shares: Option<Decimal>,
    pub lock_tier: Option<i32>,
    pub block_number: Option<i64>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl SavingsTransaction {
    /// Builds a new entry with a fresh id. Chain metadata starts empty.
    pub fn new(
        user_id: &str,
        transaction_type: TransactionType,
        status: TransactionStatus,
        amount: Decimal,
        token_address: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            goal_id: None,
            group_goal_id: None,
            from_goal_id: None,
            to_goal_id: None,
            transaction_type,
            status,
            amount,
            token_address: normalize_address(token_address),
            tx_hash: None,
            wallet_address: None,
            vault_address: None,
            deposit_id: None,
            shares: None,
            lock_tier: None,
            block_number: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        }
    }

    pub fn for_goal(mut self, goal_id: &str) -> Self {
        self.goal_id = Some(goal_id.to_string());
        self
    }

    pub fn for_group_goal(mut self, group_goal_id: &str) -> Self {
        self.group_goal_id = Some(group_goal_id.to_string());
        self
    }

    pub fn between_goals(mut self, from_goal_id: &str, to_goal_id: &str) -> Self {
        self.from_goal_id = Some(from_goal_id.to_string());
        self.to_goal_id = Some(to_goal_id.to_string());
        self
    }

    /// Attaches the correlation fields returned by the signing layer.
    pub fn with_submission(mut self, submission: Option<ChainSubmission>) -> Self {
        if let Some(submission) = submission.map(ChainSubmission::normalized) {
            self.tx_hash = Some(submission.tx_hash);
            self.wallet_address = submission.wallet_address;
            self.vault_address = Some(submission.vault_address);
            self.deposit_id = submission.deposit_id;
        }
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Moves the entry to `next`, rejecting transitions out of frozen states.
    pub fn transition(&mut self, next: TransactionStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "Transaction {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        if next == TransactionStatus::Confirmed {
            self.confirmed_at = Some(now);
        }
        Ok(())
    }
}

/// A transaction rewrite guarded by the status it is expected to still have.
#[derive(Debug, Clone)]
pub struct TransactionUpdate {
    pub transaction: SavingsTransaction,
    pub expected_status: TransactionStatus,
}
