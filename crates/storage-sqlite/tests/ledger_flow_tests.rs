//! Deposit, confirm and redeliver against a real SQLite file.

use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::tempdir;

use vaultledger_core::events::NoOpDomainEventSink;
use vaultledger_core::goals::{
    GoalDepositRequest, GoalService, GoalServiceTrait, NewGoal, TokenIdentity,
};
use vaultledger_core::group_goals::GroupGoalService;
use vaultledger_core::ledger::LedgerConfig;
use vaultledger_core::transactions::{
    ChainSubmission, SavingsTransactionRepositoryTrait, TransactionStatus,
};
use vaultledger_core::vault::{
    AuditStatus, EventExtra, NormalizedVaultEvent, ReconcileOutcome, Reconciler,
    VaultAuditRepositoryTrait, VaultEventKind,
};
use vaultledger_storage_sqlite::{
    create_pool, run_migrations, spawn_writer, GoalRepository, GroupGoalRepository,
    SavingsTransactionRepository, SqliteLedgerStore, VaultAuditRepository,
};

const VAULT: &str = "0xvault";
const WALLET: &str = "0xwallet";

#[tokio::test]
async fn test_deposit_is_confirmed_once_by_its_chain_event() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.db").to_string_lossy().to_string();
    let pool = create_pool(&db_path).unwrap();
    run_migrations(&pool).unwrap();
    let writer = spawn_writer((*pool).clone());

    let transactions = Arc::new(SavingsTransactionRepository::new(pool.clone()));
    let audit = Arc::new(VaultAuditRepository::new(pool.clone(), writer.clone()));
    let store = Arc::new(SqliteLedgerStore::new(writer.clone()));
    let sink = Arc::new(NoOpDomainEventSink);
    let goals = Arc::new(GoalService::new(
        Arc::new(GoalRepository::new(pool.clone(), writer.clone())),
        transactions.clone(),
        store.clone(),
        sink.clone(),
        LedgerConfig::default(),
    ));
    let groups = Arc::new(GroupGoalService::new(
        Arc::new(GroupGoalRepository::new(pool.clone(), writer.clone())),
        transactions.clone(),
        store.clone(),
        sink.clone(),
        LedgerConfig::default(),
    ));
    let reconciler = Reconciler::new(
        audit.clone(),
        transactions.clone(),
        store.clone(),
        goals.clone(),
        groups,
        sink,
    );

    let goal = goals
        .create_goal(NewGoal {
            id: None,
            owner_id: "alice".to_string(),
            title: "Rainy day".to_string(),
            description: None,
            token: TokenIdentity::new("0xusdc", "USDC", 6),
            target_amount: dec!(1000),
            annual_interest_rate: None,
            is_quick_save: false,
        })
        .await
        .unwrap();
    let deposit = goals
        .deposit_to_goal(GoalDepositRequest {
            goal_id: goal.id.clone(),
            amount: dec!(250),
            submission: Some(ChainSubmission {
                tx_hash: "0xAA01".to_string(),
                wallet_address: Some(WALLET.to_string()),
                vault_address: VAULT.to_string(),
                deposit_id: None,
            }),
        })
        .await
        .unwrap();
    assert_eq!(deposit.goal.current_amount, dec!(250));
    assert_eq!(deposit.transaction.status, TransactionStatus::Pending);

    let event = NormalizedVaultEvent {
        network: "base".to_string(),
        vault_address: VAULT.to_string(),
        kind: VaultEventKind::Deposited,
        user_address: Some(WALLET.to_string()),
        amount: dec!(245),
        correlation_id: Some("3".to_string()),
        block_number: 500,
        log_index: 0,
        tx_hash: "0xaa01".to_string(),
        extra: EventExtra::Deposited {
            shares: dec!(245),
            lock_tier: 0,
        },
    };
    let event_id = event.event_id();

    let outcome = reconciler.process_event(event.clone()).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Matched { .. }));

    let confirmed = transactions.get_transaction(&deposit.transaction.id).unwrap();
    assert_eq!(confirmed.status, TransactionStatus::Confirmed);
    assert_eq!(confirmed.amount, dec!(245));
    assert_eq!(confirmed.deposit_id.as_deref(), Some("3"));
    assert!(confirmed.confirmed_at.is_some_and(|at| at <= Utc::now()));
    // The chain amount wins over the amount booked at request time.
    assert_eq!(goals.get_goal(&goal.id).unwrap().current_amount, dec!(245));

    let record = audit.get_event(&event_id).unwrap().unwrap();
    assert_eq!(record.status, AuditStatus::Matched);
    assert_eq!(
        record.matched_transaction_id.as_deref(),
        Some(deposit.transaction.id.as_str())
    );

    let again = reconciler.process_event(event).await.unwrap();
    assert_eq!(again, ReconcileOutcome::Duplicate);
    assert_eq!(goals.get_goal(&goal.id).unwrap().current_amount, dec!(245));
    assert_eq!(goals.list_goal_transactions(&goal.id).unwrap().len(), 1);
}
