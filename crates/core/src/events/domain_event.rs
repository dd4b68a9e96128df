//! Domain event types.

use serde::{Deserialize, Serialize};

/// Domain events emitted by core services after a ledger commit succeeds.
///
/// These events represent facts about data that already changed. Runtime
/// adapters decide what to do with them (log, push to clients, etc.).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Balances, status or metadata of personal goals changed.
    GoalsChanged { goal_ids: Vec<String> },

    /// A group goal or its membership changed.
    GroupGoalChanged { group_goal_id: String },

    /// Pending transactions were matched to chain events.
    TransactionsReconciled {
        vault_address: String,
        transaction_ids: Vec<String>,
    },

    /// Chain events arrived with no pending transaction to match.
    OrphanEventsRecorded { vault_address: String, count: usize },
}

impl DomainEvent {
    pub fn goals_changed(goal_ids: Vec<String>) -> Self {
        Self::GoalsChanged { goal_ids }
    }

    pub fn group_goal_changed(group_goal_id: impl Into<String>) -> Self {
        Self::GroupGoalChanged {
            group_goal_id: group_goal_id.into(),
        }
    }

    pub fn transactions_reconciled(
        vault_address: impl Into<String>,
        transaction_ids: Vec<String>,
    ) -> Self {
        Self::TransactionsReconciled {
            vault_address: vault_address.into(),
            transaction_ids,
        }
    }

    pub fn orphan_events_recorded(vault_address: impl Into<String>, count: usize) -> Self {
        Self::OrphanEventsRecorded {
            vault_address: vault_address.into(),
            count,
        }
    }
}
