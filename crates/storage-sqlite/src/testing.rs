//! Temp-file database and fixtures for repository tests.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

use vaultledger_core::goals::{Goal, NewGoal, TokenIdentity};
use vaultledger_core::group_goals::{GroupGoal, NewGroupGoal};
use vaultledger_core::vault::{EventExtra, NormalizedVaultEvent, VaultAuditRecord, VaultEventKind};

use crate::db::{create_pool, run_migrations, spawn_writer, DbPool, WriteHandle};

pub(crate) const VAULT: &str = "0xvault";
pub(crate) const WALLET: &str = "0xwallet";

pub(crate) struct TestDb {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    _dir: TempDir,
}

/// Must be called from inside a Tokio runtime (the writer is a spawned task).
pub(crate) fn setup() -> TestDb {
    let dir = tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db").to_string_lossy().to_string();
    let pool = create_pool(&db_path).expect("Failed to create pool");
    run_migrations(&pool).expect("Failed to run migrations");
    let writer = spawn_writer((*pool).clone());
    TestDb {
        pool,
        writer,
        _dir: dir,
    }
}

pub(crate) fn usdc() -> TokenIdentity {
    TokenIdentity::new("0xUSDC", "USDC", 6)
}

pub(crate) fn goal(id: &str, owner: &str, quick_save: bool) -> Goal {
    Goal::from_new(
        NewGoal {
            id: Some(id.to_string()),
            owner_id: owner.to_string(),
            title: format!("Goal {}", id),
            description: None,
            token: usdc(),
            target_amount: Decimal::from(1000),
            annual_interest_rate: None,
            is_quick_save: quick_save,
        },
        Decimal::new(5, 2),
        Utc::now(),
    )
}

pub(crate) fn group_goal(id: &str, owner: &str) -> GroupGoal {
    GroupGoal::from_new(
        NewGroupGoal {
            id: Some(id.to_string()),
            owner_id: owner.to_string(),
            title: format!("Group {}", id),
            description: Some("shared".to_string()),
            token: usdc(),
            target_amount: Decimal::from(500),
            requires_approval: false,
            max_members: Some(5),
        },
        10,
        Utc::now(),
    )
}

pub(crate) fn deposited_event(
    tx_hash: &str,
    block: u64,
    log_index: u64,
    amount: i64,
) -> NormalizedVaultEvent {
    NormalizedVaultEvent {
        network: "base".to_string(),
        vault_address: VAULT.to_string(),
        kind: VaultEventKind::Deposited,
        user_address: Some(WALLET.to_string()),
        amount: Decimal::from(amount),
        correlation_id: Some("7".to_string()),
        block_number: block,
        log_index,
        tx_hash: tx_hash.to_string(),
        extra: EventExtra::Deposited {
            shares: Decimal::from(amount),
            lock_tier: 1,
        },
    }
}

pub(crate) fn record(event: NormalizedVaultEvent) -> VaultAuditRecord {
    VaultAuditRecord::new(event, Utc::now())
}
