//! Matches normalized vault events to pending ledger transactions.

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::vault_model::{AuditStatus, NormalizedVaultEvent, VaultAuditRecord, VaultEventKind};
use super::vault_traits::VaultAuditRepositoryTrait;
use crate::errors::{Error, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::goals::GoalServiceTrait;
use crate::group_goals::GroupGoalServiceTrait;
use crate::ledger::{
    retry_on_conflict, ChainConfirmation, ConfirmationResult, LedgerBatch, LedgerStoreTrait,
};
use crate::transactions::{
    ChainSubmission, SavingsTransaction, SavingsTransactionRepositoryTrait, TransactionStatus,
};

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// A pending transaction was confirmed.
    Matched {
        transaction_id: String,
        event_kind: VaultEventKind,
        interest_transaction_id: Option<String>,
    },
    /// No pending transaction yet. The event stays in the audit store and is
    /// retried on later passes.
    Orphaned,
    /// The event was already matched earlier.
    Duplicate,
    /// Recorded for audit only (vault-wide yield distribution).
    AuditOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub matched_transaction_ids: Vec<String>,
    pub orphaned: usize,
    pub duplicates: usize,
    pub audit_only: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Matched { transaction_id, .. } => {
                self.matched_transaction_ids.push(transaction_id.clone())
            }
            ReconcileOutcome::Orphaned => self.orphaned += 1,
            ReconcileOutcome::Duplicate => self.duplicates += 1,
            ReconcileOutcome::AuditOnly => self.audit_only += 1,
        }
    }

    pub fn merge(&mut self, other: ReconcileSummary) {
        self.matched_transaction_ids
            .extend(other.matched_transaction_ids);
        self.orphaned += other.orphaned;
        self.duplicates += other.duplicates;
        self.audit_only += other.audit_only;
        self.failed += other.failed;
    }
}

/// Whether `transaction` is the pending entry `event` confirms.
///
/// The tx hash is already equal (candidates are looked up by it). The vault
/// must match, the wallet must match when one was recorded, and the deposit
/// id must match once the transaction knows it.
fn is_correlated(transaction: &SavingsTransaction, event: &NormalizedVaultEvent) -> bool {
    let kind_fits = match event.kind {
        VaultEventKind::Deposited => transaction.transaction_type.is_inflow(),
        VaultEventKind::Withdrawn => transaction.transaction_type.is_outflow(),
        VaultEventKind::YieldDistributed => false,
    };
    let vault_fits = transaction.vault_address.as_deref() == Some(event.vault_address.as_str());
    let wallet_fits = match (&transaction.wallet_address, &event.user_address) {
        (Some(wallet), Some(user)) => wallet == user,
        (Some(_), None) => false,
        (None, _) => true,
    };
    let deposit_fits = match (&transaction.deposit_id, &event.correlation_id) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => true,
    };
    transaction.is_pending() && kind_fits && vault_fits && wallet_fits && deposit_fits
}

pub struct Reconciler {
    audit_repository: Arc<dyn VaultAuditRepositoryTrait>,
    transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
    ledger_store: Arc<dyn LedgerStoreTrait>,
    goal_service: Arc<dyn GoalServiceTrait>,
    group_goal_service: Arc<dyn GroupGoalServiceTrait>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl Reconciler {
    pub fn new(
        audit_repository: Arc<dyn VaultAuditRepositoryTrait>,
        transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
        ledger_store: Arc<dyn LedgerStoreTrait>,
        goal_service: Arc<dyn GoalServiceTrait>,
        group_goal_service: Arc<dyn GroupGoalServiceTrait>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            audit_repository,
            transaction_repository,
            ledger_store,
            goal_service,
            group_goal_service,
            event_sink,
        }
    }

    /// Records one event in the audit store, then reconciles it.
    pub async fn process_event(&self, event: NormalizedVaultEvent) -> Result<ReconcileOutcome> {
        let record = VaultAuditRecord::new(event, Utc::now());
        self.audit_repository
            .record_events(vec![record.clone()])
            .await?;
        self.reconcile_record(&record).await
    }

    /// Reconciles an event that is already in the audit store. The stored
    /// status decides, so re-delivered events are no-ops.
    pub async fn reconcile_record(&self, record: &VaultAuditRecord) -> Result<ReconcileOutcome> {
        let stored = self
            .audit_repository
            .get_event(&record.event_id)?
            .ok_or_else(|| Error::not_found("vault event", record.event_id.clone()))?;
        match stored.status {
            AuditStatus::Matched => return Ok(ReconcileOutcome::Duplicate),
            AuditStatus::AuditOnly => return Ok(ReconcileOutcome::AuditOnly),
            AuditStatus::Orphaned => {}
        }
        let event = &stored.event;
        if event.kind == VaultEventKind::YieldDistributed {
            return Ok(ReconcileOutcome::AuditOnly);
        }

        let candidate = self
            .transaction_repository
            .list_pending_by_tx_hash(&event.tx_hash)?
            .into_iter()
            .find(|tx| is_correlated(tx, event));
        let Some(transaction) = candidate else {
            warn!(
                "No pending transaction for {} event {} (tx {}, block {}); kept as orphan",
                event.kind, stored.event_id, event.tx_hash, event.block_number
            );
            return Ok(ReconcileOutcome::Orphaned);
        };

        let confirmation = ChainConfirmation {
            transaction,
            event: event.clone(),
            event_id: stored.event_id.clone(),
        };
        match self.confirm(confirmation).await {
            Ok(result) => {
                debug!(
                    "Matched {} event {} to transaction {}",
                    event.kind, stored.event_id, result.transaction.id
                );
                Ok(ReconcileOutcome::Matched {
                    transaction_id: result.transaction.id,
                    event_kind: event.kind,
                    interest_transaction_id: result.interest_transaction.map(|t| t.id),
                })
            }
            Err(err) => {
                // A concurrent pass may have matched it first.
                let now_matched = self
                    .audit_repository
                    .get_event(&stored.event_id)?
                    .is_some_and(|r| r.status == AuditStatus::Matched);
                if now_matched {
                    Ok(ReconcileOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn confirm(&self, confirmation: ChainConfirmation) -> Result<ConfirmationResult> {
        if confirmation.transaction.group_goal_id.is_some() {
            self.group_goal_service
                .apply_confirmation(confirmation)
                .await
        } else {
            self.goal_service.apply_confirmation(confirmation).await
        }
    }

    /// Reconciles already-recorded events in order. Individual failures are
    /// logged and counted; they leave the event orphaned for a later pass.
    pub async fn reconcile_records(&self, records: &[VaultAuditRecord]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for record in records {
            match self.reconcile_record(record).await {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    error!(
                        "Failed to reconcile vault event {} (tx {}): {}",
                        record.event_id, record.event.tx_hash, err
                    );
                    summary.failed += 1;
                }
            }
        }
        if let Some(first) = records.first() {
            let vault = &first.event.vault_address;
            if !summary.matched_transaction_ids.is_empty() {
                self.event_sink.emit(DomainEvent::transactions_reconciled(
                    vault.clone(),
                    summary.matched_transaction_ids.clone(),
                ));
            }
            if summary.orphaned > 0 {
                self.event_sink
                    .emit(DomainEvent::orphan_events_recorded(vault.clone(), summary.orphaned));
            }
        }
        summary
    }

    /// Re-runs matching for every orphaned event, optionally for one vault.
    pub async fn retry_orphans(&self, vault_address: Option<&str>) -> Result<ReconcileSummary> {
        let orphans = self
            .audit_repository
            .list_by_status(AuditStatus::Orphaned, vault_address)?;
        Ok(self.reconcile_orphans(&orphans).await)
    }

    /// Re-runs matching only for orphans whose tx hash is carried by a pending
    /// transaction of this vault. Orphans no pending entry can claim are not read.
    pub async fn retry_claimable_orphans(&self, vault_address: &str) -> Result<ReconcileSummary> {
        let mut orphans = Vec::new();
        for tx_hash in self.transaction_repository.list_pending_tx_hashes(vault_address)? {
            orphans.extend(
                self.audit_repository
                    .list_orphans_by_tx_hash(vault_address, &tx_hash)?,
            );
        }
        orphans.sort_by_key(|r| (r.event.block_number, r.event.log_index));
        Ok(self.reconcile_orphans(&orphans).await)
    }

    async fn reconcile_orphans(&self, orphans: &[VaultAuditRecord]) -> ReconcileSummary {
        if orphans.is_empty() {
            return ReconcileSummary::default();
        }
        let mut summary = ReconcileSummary::default();
        let mut matched_by_vault: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in orphans {
            match self.reconcile_record(record).await {
                Ok(outcome) => {
                    if let ReconcileOutcome::Matched { transaction_id, .. } = &outcome {
                        matched_by_vault
                            .entry(record.event.vault_address.clone())
                            .or_default()
                            .push(transaction_id.clone());
                    }
                    summary.record(&outcome);
                }
                Err(err) => {
                    warn!("Orphan {} still unmatched: {}", record.event_id, err);
                    summary.failed += 1;
                }
            }
        }
        for (vault, transaction_ids) in matched_by_vault {
            self.event_sink
                .emit(DomainEvent::transactions_reconciled(vault, transaction_ids));
        }
        info!(
            "Orphan pass: {} matched, {} still orphaned, {} failed",
            summary.matched_transaction_ids.len(),
            summary.orphaned,
            summary.failed
        );
        summary
    }

    async fn try_attach(
        &self,
        transaction_id: &str,
        submission: &ChainSubmission,
    ) -> Result<SavingsTransaction> {
        let transaction = self.transaction_repository.get_transaction(transaction_id)?;
        if !transaction.is_pending() {
            return Err(Error::InvalidState(format!(
                "Transaction {} is {}; chain data can only be attached while pending",
                transaction.id, transaction.status
            )));
        }
        let mut transaction = transaction.with_submission(Some(submission.clone()));
        transaction.updated_at = Utc::now();
        let mut batch = LedgerBatch::new();
        batch.update_transaction(transaction.clone(), TransactionStatus::Pending);
        self.ledger_store.commit(batch).await?;
        Ok(transaction)
    }

    /// Records the signing layer's correlation data on a pending transaction,
    /// then retries the vault's orphans with the same tx hash so an event
    /// that arrived first still matches.
    pub async fn attach_chain_submission(
        &self,
        transaction_id: &str,
        submission: ChainSubmission,
    ) -> Result<SavingsTransaction> {
        let submission = submission.normalized();
        if submission.tx_hash.is_empty() || submission.vault_address.is_empty() {
            return Err(ValidationError::MissingField("txHash/vaultAddress".to_string()).into());
        }
        let transaction = retry_on_conflict("attach chain submission", || {
            self.try_attach(transaction_id, &submission)
        })
        .await?;
        let orphans = self
            .audit_repository
            .list_orphans_by_tx_hash(&submission.vault_address, &submission.tx_hash)?;
        self.reconcile_orphans(&orphans).await;
        // Reload: the orphan pass may have confirmed it.
        self.transaction_repository.get_transaction(&transaction.id)
    }

    /// Fails a pending transaction through the engine that owns it.
    pub async fn fail_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<SavingsTransaction> {
        let transaction = self.transaction_repository.get_transaction(transaction_id)?;
        if transaction.group_goal_id.is_some() {
            self.group_goal_service
                .fail_transaction(transaction_id, reason)
                .await
        } else {
            self.goal_service
                .fail_transaction(transaction_id, reason)
                .await
        }
    }
}
