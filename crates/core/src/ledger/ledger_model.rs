//! Unit-of-work types shared by the ledger engines and the reconciler.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ANNUAL_INTEREST_RATE, DEFAULT_GROUP_MEMBER_CAP, DEFAULT_PRICE_STALENESS_SECS,
};
use crate::errors::{Error, Result};
use crate::goals::Goal;
use crate::group_goals::GroupGoal;
use crate::transactions::{
    SavingsTransaction, TransactionStatus, TransactionType, TransactionUpdate,
};
use crate::vault::{AuditMatch, NormalizedVaultEvent};

/// Ledger-wide settings handed to the engines at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub default_annual_rate: Decimal,
    pub group_member_cap: u32,
    pub price_staleness_secs: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_annual_rate: Decimal::from_str(DEFAULT_ANNUAL_INTEREST_RATE)
                .unwrap_or(Decimal::ZERO),
            group_member_cap: DEFAULT_GROUP_MEMBER_CAP,
            price_staleness_secs: DEFAULT_PRICE_STALENESS_SECS,
        }
    }
}

/// An entity rewrite that only applies if the stored row still has
/// `expected_version`.
#[derive(Debug, Clone)]
pub struct VersionedUpdate<T> {
    pub entity: T,
    pub expected_version: i64,
}

/// Everything one ledger operation writes. The store commits a batch
/// atomically or not at all, failing with `ConcurrencyConflict` when any
/// expected version or status is stale.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub goal_updates: Vec<VersionedUpdate<Goal>>,
    pub group_goal_updates: Vec<VersionedUpdate<GroupGoal>>,
    pub new_transactions: Vec<SavingsTransaction>,
    pub transaction_updates: Vec<TransactionUpdate>,
    pub audit_matches: Vec<AuditMatch>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `goal` for writing, bumping its version.
    pub fn update_goal(&mut self, mut goal: Goal, now: DateTime<Utc>) -> Goal {
        let expected_version = goal.version;
        goal.touch(now);
        self.goal_updates.push(VersionedUpdate {
            entity: goal.clone(),
            expected_version,
        });
        goal
    }

    pub fn update_group_goal(&mut self, mut group_goal: GroupGoal, now: DateTime<Utc>) -> GroupGoal {
        let expected_version = group_goal.version;
        group_goal.touch(now);
        self.group_goal_updates.push(VersionedUpdate {
            entity: group_goal.clone(),
            expected_version,
        });
        group_goal
    }

    pub fn insert_transaction(&mut self, transaction: SavingsTransaction) {
        self.new_transactions.push(transaction);
    }

    pub fn update_transaction(
        &mut self,
        transaction: SavingsTransaction,
        expected_status: TransactionStatus,
    ) {
        self.transaction_updates.push(TransactionUpdate {
            transaction,
            expected_status,
        });
    }

    pub fn mark_matched(&mut self, audit_match: AuditMatch) {
        self.audit_matches.push(audit_match);
    }

    pub fn is_empty(&self) -> bool {
        self.goal_updates.is_empty()
            && self.group_goal_updates.is_empty()
            && self.new_transactions.is_empty()
            && self.transaction_updates.is_empty()
            && self.audit_matches.is_empty()
    }
}

/// A pending transaction matched to the chain event that confirms it.
#[derive(Debug, Clone)]
pub struct ChainConfirmation {
    pub transaction: SavingsTransaction,
    pub event: NormalizedVaultEvent,
    pub event_id: String,
}

impl ChainConfirmation {
    /// Signed correction to the owning balance so it reflects the chain amount
    /// rather than the amount booked at request time.
    pub fn balance_delta(&self) -> Result<Decimal> {
        let booked = self.transaction.amount;
        let confirmed = self.event.amount;
        match self.transaction.transaction_type {
            t if t.is_inflow() => Ok(confirmed - booked),
            t if t.is_outflow() => Ok(booked - confirmed),
            other => Err(Error::InvalidState(format!(
                "{} transactions are not confirmed by vault events",
                other
            ))),
        }
    }

    /// The pending transaction moved to confirmed with chain metadata attached.
    pub fn confirmed_transaction(&self, now: DateTime<Utc>) -> Result<SavingsTransaction> {
        let event = &self.event;
        let mut transaction = self.transaction.clone();
        transaction.transition(TransactionStatus::Confirmed, now)?;
        transaction.amount = event.amount;
        transaction.tx_hash = Some(event.tx_hash.clone());
        transaction.vault_address = Some(event.vault_address.clone());
        if transaction.wallet_address.is_none() {
            transaction.wallet_address = event.user_address.clone();
        }
        if let Some(deposit_id) = &event.correlation_id {
            transaction.deposit_id = Some(deposit_id.clone());
        }
        transaction.shares = event.shares();
        transaction.lock_tier = event.lock_tier().map(i32::from);
        transaction.block_number = i64::try_from(event.block_number).ok();
        Ok(transaction)
    }

    /// Confirmed `interest` entry for the yield paid out with a withdrawal.
    pub fn yield_transaction(&self, now: DateTime<Utc>) -> Result<Option<SavingsTransaction>> {
        let yield_amount = self.event.yield_amount();
        if yield_amount <= Decimal::ZERO {
            return Ok(None);
        }
        let source = &self.transaction;
        let mut interest = SavingsTransaction::new(
            &source.user_id,
            TransactionType::Interest,
            TransactionStatus::Pending,
            yield_amount,
            &source.token_address,
            now,
        );
        interest.goal_id = source.goal_id.clone();
        interest.group_goal_id = source.group_goal_id.clone();
        interest.tx_hash = Some(self.event.tx_hash.clone());
        interest.vault_address = Some(self.event.vault_address.clone());
        interest.wallet_address = self.event.user_address.clone();
        interest.deposit_id = self.event.correlation_id.clone();
        interest.block_number = i64::try_from(self.event.block_number).ok();
        interest.transition(TransactionStatus::Confirmed, now)?;
        Ok(Some(interest))
    }

    pub fn audit_match(&self, now: DateTime<Utc>) -> AuditMatch {
        AuditMatch {
            event_id: self.event_id.clone(),
            transaction_id: self.transaction.id.clone(),
            reconciled_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResult {
    pub transaction: SavingsTransaction,
    pub interest_transaction: Option<SavingsTransaction>,
}
