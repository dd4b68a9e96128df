//! In-memory repositories and ledger store for service tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{DatabaseError, Error, Result};
use crate::events::MockDomainEventSink;
use crate::goals::{Goal, GoalRepositoryTrait, GoalService, NewGoal, TokenIdentity};
use crate::group_goals::{GroupGoal, GroupGoalRepositoryTrait, GroupGoalService};
use crate::ledger::{LedgerBatch, LedgerConfig, LedgerStoreTrait};
use crate::transactions::{SavingsTransaction, SavingsTransactionRepositoryTrait};
use crate::vault::{
    AuditStatus, CheckpointRepositoryTrait, Reconciler, ScanCheckpoint, VaultAuditRecord,
    VaultAuditRepositoryTrait,
};

#[derive(Default)]
struct State {
    goals: HashMap<String, Goal>,
    group_goals: HashMap<String, GroupGoal>,
    transactions: Vec<SavingsTransaction>,
    events: Vec<VaultAuditRecord>,
    checkpoints: HashMap<(String, String), ScanCheckpoint>,
}

/// Mirrors the storage layer's commit rules: every expected version and
/// status is checked before anything is written.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    /// Number of upcoming commits to reject with a concurrency conflict.
    conflicts_to_inject: AtomicUsize,
    /// Fail every `record_events` call when set.
    pub fail_audit_writes: std::sync::atomic::AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inject_conflicts(&self, count: usize) {
        self.conflicts_to_inject.store(count, Ordering::SeqCst);
    }

    pub fn goal(&self, goal_id: &str) -> Goal {
        self.state.lock().unwrap().goals[goal_id].clone()
    }

    pub fn group_goal(&self, group_goal_id: &str) -> GroupGoal {
        self.state.lock().unwrap().group_goals[group_goal_id].clone()
    }

    pub fn transactions(&self) -> Vec<SavingsTransaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn events(&self) -> Vec<VaultAuditRecord> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl LedgerStoreTrait for InMemoryLedger {
    async fn commit(&self, batch: LedgerBatch) -> Result<()> {
        if self
            .conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::conflict("goal", "injected"));
        }
        let mut state = self.state.lock().unwrap();

        for update in &batch.goal_updates {
            let stored = state
                .goals
                .get(&update.entity.id)
                .ok_or_else(|| Error::not_found("goal", update.entity.id.clone()))?;
            if stored.version != update.expected_version {
                return Err(Error::conflict("goal", update.entity.id.clone()));
            }
        }
        for update in &batch.group_goal_updates {
            let stored = state
                .group_goals
                .get(&update.entity.id)
                .ok_or_else(|| Error::not_found("group goal", update.entity.id.clone()))?;
            if stored.version != update.expected_version {
                return Err(Error::conflict("group goal", update.entity.id.clone()));
            }
        }
        for update in &batch.transaction_updates {
            let stored = state
                .transactions
                .iter()
                .find(|t| t.id == update.transaction.id)
                .ok_or_else(|| Error::not_found("transaction", update.transaction.id.clone()))?;
            if stored.status != update.expected_status {
                return Err(Error::conflict("transaction", update.transaction.id.clone()));
            }
        }
        for audit_match in &batch.audit_matches {
            let stored = state
                .events
                .iter()
                .find(|e| e.event_id == audit_match.event_id)
                .ok_or_else(|| Error::not_found("vault event", audit_match.event_id.clone()))?;
            if stored.status != AuditStatus::Orphaned {
                return Err(Error::conflict("vault event", audit_match.event_id.clone()));
            }
        }

        for update in batch.goal_updates {
            state.goals.insert(update.entity.id.clone(), update.entity);
        }
        for update in batch.group_goal_updates {
            state
                .group_goals
                .insert(update.entity.id.clone(), update.entity);
        }
        for update in batch.transaction_updates {
            if let Some(stored) = state
                .transactions
                .iter_mut()
                .find(|t| t.id == update.transaction.id)
            {
                *stored = update.transaction;
            }
        }
        state.transactions.extend(batch.new_transactions);
        for audit_match in batch.audit_matches {
            if let Some(stored) = state
                .events
                .iter_mut()
                .find(|e| e.event_id == audit_match.event_id)
            {
                stored.status = AuditStatus::Matched;
                stored.matched_transaction_id = Some(audit_match.transaction_id);
                stored.reconciled_at = Some(audit_match.reconciled_at);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GoalRepositoryTrait for InMemoryLedger {
    fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        self.state
            .lock()
            .unwrap()
            .goals
            .get(goal_id)
            .cloned()
            .ok_or_else(|| Error::not_found("goal", goal_id))
    }

    fn list_goals_for_owner(&self, owner_id: &str) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .state
            .lock()
            .unwrap()
            .goals
            .values()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(goals)
    }

    fn find_quick_save_goal(&self, owner_id: &str) -> Result<Option<Goal>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .goals
            .values()
            .find(|g| g.owner_id == owner_id && g.is_quick_save)
            .cloned())
    }

    async fn insert_goal(&self, goal: Goal) -> Result<Goal> {
        let mut state = self.state.lock().unwrap();
        if goal.is_quick_save
            && state
                .goals
                .values()
                .any(|g| g.owner_id == goal.owner_id && g.is_quick_save)
        {
            return Err(DatabaseError::UniqueViolation("goals.owner_id".to_string()).into());
        }
        state.goals.insert(goal.id.clone(), goal.clone());
        Ok(goal)
    }

    async fn delete_goal(&self, goal_id: &str, expected_version: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.goals.get(goal_id) {
            Some(goal) if goal.version == expected_version => {
                state.goals.remove(goal_id);
                Ok(())
            }
            Some(_) => Err(Error::conflict("goal", goal_id)),
            None => Err(Error::not_found("goal", goal_id)),
        }
    }
}

impl SavingsTransactionRepositoryTrait for InMemoryLedger {
    fn get_transaction(&self, transaction_id: &str) -> Result<SavingsTransaction> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned()
            .ok_or_else(|| Error::not_found("transaction", transaction_id))
    }

    fn list_for_goal(&self, goal_id: &str) -> Result<Vec<SavingsTransaction>> {
        let id = Some(goal_id.to_string());
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|t| t.goal_id == id || t.from_goal_id == id || t.to_goal_id == id)
            .cloned()
            .collect())
    }

    fn list_for_group_goal(&self, group_goal_id: &str) -> Result<Vec<SavingsTransaction>> {
        let id = Some(group_goal_id.to_string());
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|t| t.group_goal_id == id)
            .cloned()
            .collect())
    }

    fn list_pending_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<SavingsTransaction>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|t| t.is_pending() && t.tx_hash.as_deref() == Some(tx_hash))
            .cloned()
            .collect())
    }

    fn list_pending_tx_hashes(&self, vault_address: &str) -> Result<Vec<String>> {
        let mut hashes: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|t| t.is_pending() && t.vault_address.as_deref() == Some(vault_address))
            .filter_map(|t| t.tx_hash.clone())
            .collect();
        hashes.sort();
        hashes.dedup();
        Ok(hashes)
    }
}

#[async_trait]
impl GroupGoalRepositoryTrait for InMemoryLedger {
    fn get_group_goal(&self, group_goal_id: &str) -> Result<GroupGoal> {
        self.state
            .lock()
            .unwrap()
            .group_goals
            .get(group_goal_id)
            .cloned()
            .ok_or_else(|| Error::not_found("group goal", group_goal_id))
    }

    fn list_group_goals_for_user(&self, user_id: &str) -> Result<Vec<GroupGoal>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .group_goals
            .values()
            .filter(|g| g.member(user_id).is_some())
            .cloned()
            .collect())
    }

    async fn insert_group_goal(&self, group_goal: GroupGoal) -> Result<GroupGoal> {
        self.state
            .lock()
            .unwrap()
            .group_goals
            .insert(group_goal.id.clone(), group_goal.clone());
        Ok(group_goal)
    }
}

#[async_trait]
impl VaultAuditRepositoryTrait for InMemoryLedger {
    async fn record_events(&self, records: Vec<VaultAuditRecord>) -> Result<usize> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("disk full".to_string()).into());
        }
        let mut state = self.state.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            if state.events.iter().all(|e| e.event_id != record.event_id) {
                state.events.push(record);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn get_event(&self, event_id: &str) -> Result<Option<VaultAuditRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    fn list_by_status(
        &self,
        status: AuditStatus,
        vault_address: Option<&str>,
    ) -> Result<Vec<VaultAuditRecord>> {
        let mut events: Vec<VaultAuditRecord> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.status == status)
            .filter(|e| vault_address.map_or(true, |v| e.event.vault_address == v))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.event.block_number, e.event.log_index));
        Ok(events)
    }

    fn list_orphans_by_tx_hash(
        &self,
        vault_address: &str,
        tx_hash: &str,
    ) -> Result<Vec<VaultAuditRecord>> {
        let mut events: Vec<VaultAuditRecord> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.status == AuditStatus::Orphaned)
            .filter(|e| e.event.vault_address == vault_address && e.event.tx_hash == tx_hash)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.event.block_number, e.event.log_index));
        Ok(events)
    }

    fn list_events(
        &self,
        network: &str,
        vault_address: &str,
        limit: i64,
    ) -> Result<Vec<VaultAuditRecord>> {
        let mut events: Vec<VaultAuditRecord> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.event.network == network && e.event.vault_address == vault_address)
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse((e.event.block_number, e.event.log_index)));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }
}

#[async_trait]
impl CheckpointRepositoryTrait for InMemoryLedger {
    fn get_checkpoint(&self, network: &str, vault_address: &str) -> Result<Option<ScanCheckpoint>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .checkpoints
            .get(&(network.to_string(), vault_address.to_string()))
            .cloned())
    }

    async fn advance_checkpoint(
        &self,
        network: &str,
        vault_address: &str,
        block: u64,
    ) -> Result<ScanCheckpoint> {
        let mut state = self.state.lock().unwrap();
        let key = (network.to_string(), vault_address.to_string());
        let last = state
            .checkpoints
            .get(&key)
            .map_or(block, |c| c.last_processed_block.max(block));
        let checkpoint = ScanCheckpoint {
            network: network.to_string(),
            vault_address: vault_address.to_string(),
            last_processed_block: last,
            updated_at: Utc::now(),
        };
        state.checkpoints.insert(key, checkpoint.clone());
        Ok(checkpoint)
    }
}

/// Engines and reconciler wired to one in-memory ledger.
pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub sink: MockDomainEventSink,
    pub goals: Arc<GoalService>,
    pub group_goals: Arc<GroupGoalService>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let ledger = InMemoryLedger::new();
        let sink = MockDomainEventSink::new();
        let goals = Arc::new(GoalService::new(
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            Arc::new(sink.clone()),
            config.clone(),
        ));
        let group_goals = Arc::new(GroupGoalService::new(
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            Arc::new(sink.clone()),
            config,
        ));
        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            goals.clone(),
            group_goals.clone(),
            Arc::new(sink.clone()),
        ));
        Self {
            ledger,
            sink,
            goals,
            group_goals,
            reconciler,
        }
    }
}

pub const TOKEN: &str = "0x00000000000000000000000000000000000000dd";
pub const VAULT: &str = "0x00000000000000000000000000000000000000aa";
pub const WALLET: &str = "0x00000000000000000000000000000000000000bb";

pub fn usdc() -> TokenIdentity {
    TokenIdentity::new(TOKEN, "USDC", 6)
}

pub fn new_goal(owner_id: &str, target: rust_decimal::Decimal) -> NewGoal {
    NewGoal {
        id: None,
        owner_id: owner_id.to_string(),
        title: "Emergency fund".to_string(),
        description: None,
        token: usdc(),
        target_amount: target,
        annual_interest_rate: None,
        is_quick_save: false,
    }
}
