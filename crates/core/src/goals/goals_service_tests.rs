use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::errors::{Error, ValidationError};
use crate::events::DomainEvent;
use crate::goals::{
    GoalDepositRequest, GoalServiceTrait, GoalStatus, GoalTransferRequest, GoalWithdrawalRequest,
    NewGoal, TokenIdentity,
};
use crate::ledger::LedgerConfig;
use crate::pricing::{PriceOracleTrait, PriceQuote};
use crate::testing::{new_goal, usdc, Harness};
use crate::transactions::{ChainSubmission, TransactionStatus, TransactionType};

fn deposit(goal_id: &str, amount: Decimal) -> GoalDepositRequest {
    GoalDepositRequest {
        goal_id: goal_id.to_string(),
        amount,
        submission: None,
    }
}

fn withdrawal(goal_id: &str, amount: Decimal) -> GoalWithdrawalRequest {
    GoalWithdrawalRequest {
        goal_id: goal_id.to_string(),
        amount,
        submission: None,
    }
}

#[tokio::test]
async fn test_deposit_updates_balance_and_progress() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();

    let result = h.goals.deposit_to_goal(deposit(&goal.id, dec!(250))).await.unwrap();

    assert_eq!(result.goal.current_amount, dec!(250));
    assert_eq!(result.goal.progress, dec!(25));
    assert_eq!(result.goal.version, 1);
    assert_eq!(result.transaction.status, TransactionStatus::Pending);
    assert_eq!(result.transaction.transaction_type, TransactionType::Deposit);
    assert_eq!(result.transaction.goal_id.as_deref(), Some(goal.id.as_str()));
    assert_eq!(h.ledger.goal(&goal.id), result.goal);
    assert!(h
        .sink
        .events()
        .contains(&DomainEvent::goals_changed(vec![goal.id.clone()])));
}

#[tokio::test]
async fn test_overdrawn_withdrawal_leaves_goal_unchanged() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&goal.id, dec!(250))).await.unwrap();
    let before = h.ledger.goal(&goal.id);
    let tx_count = h.ledger.transactions().len();

    let err = h
        .goals
        .withdraw_from_goal(withdrawal(&goal.id, dec!(300)))
        .await
        .unwrap_err();

    match err {
        Error::InsufficientBalance {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, dec!(300));
            assert_eq!(available, dec!(250));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.ledger.goal(&goal.id), before);
    assert_eq!(h.ledger.transactions().len(), tx_count);
}

#[tokio::test]
async fn test_deposit_rejected_unless_active() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals
        .update_goal_status(&goal.id, GoalStatus::Paused)
        .await
        .unwrap();

    let err = h
        .goals
        .deposit_to_goal(deposit(&goal.id, dec!(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_non_integer_or_zero_amounts_are_rejected() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    assert!(h.goals.deposit_to_goal(deposit(&goal.id, dec!(0))).await.is_err());
    assert!(h.goals.deposit_to_goal(deposit(&goal.id, dec!(1.5))).await.is_err());
    assert_eq!(h.ledger.goal(&goal.id).current_amount, Decimal::ZERO);
}

#[tokio::test]
async fn test_deposit_records_chain_submission() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let result = h
        .goals
        .deposit_to_goal(GoalDepositRequest {
            goal_id: goal.id.clone(),
            amount: dec!(5),
            submission: Some(ChainSubmission {
                tx_hash: "0xFEED".to_string(),
                wallet_address: None,
                vault_address: "0xVault".to_string(),
                deposit_id: None,
            }),
        })
        .await
        .unwrap();
    assert_eq!(result.transaction.tx_hash.as_deref(), Some("0xfeed"));
    assert_eq!(result.transaction.vault_address.as_deref(), Some("0xvault"));
}

#[tokio::test]
async fn test_transfer_moves_balance_atomically() {
    let h = Harness::new();
    let from = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let to = h.goals.create_goal(new_goal("alice", dec!(500))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&from.id, dec!(300))).await.unwrap();

    let result = h
        .goals
        .transfer_between_goals(GoalTransferRequest {
            from_goal_id: from.id.clone(),
            to_goal_id: to.id.clone(),
            amount: dec!(100),
        })
        .await
        .unwrap();

    assert_eq!(result.from_goal.current_amount, dec!(200));
    assert_eq!(result.to_goal.current_amount, dec!(100));
    assert_eq!(result.to_goal.progress, dec!(20));
    assert_eq!(result.transaction.transaction_type, TransactionType::Transfer);
    assert_eq!(result.transaction.status, TransactionStatus::Completed);
    assert_eq!(h.goals.list_goal_transactions(&to.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_transfer_between_tokens_is_rejected() {
    let h = Harness::new();
    let from = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let mut other = new_goal("alice", dec!(1000));
    other.token = TokenIdentity::new("0x00000000000000000000000000000000000000ee", "DAI", 18);
    let to = h.goals.create_goal(other).await.unwrap();
    h.goals.deposit_to_goal(deposit(&from.id, dec!(300))).await.unwrap();

    let err = h
        .goals
        .transfer_between_goals(GoalTransferRequest {
            from_goal_id: from.id.clone(),
            to_goal_id: to.id.clone(),
            amount: dec!(100),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenMismatch { .. }));
    assert_eq!(h.ledger.goal(&from.id).current_amount, dec!(300));
    assert_eq!(h.ledger.goal(&to.id).current_amount, dec!(0));
}

#[tokio::test]
async fn test_failed_transfer_commit_touches_neither_goal() {
    let h = Harness::new();
    let from = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let to = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&from.id, dec!(300))).await.unwrap();

    h.ledger.inject_conflicts(crate::constants::MAX_CONFLICT_RETRIES);
    let err = h
        .goals
        .transfer_between_goals(GoalTransferRequest {
            from_goal_id: from.id.clone(),
            to_goal_id: to.id.clone(),
            amount: dec!(100),
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(h.ledger.goal(&from.id).current_amount, dec!(300));
    assert_eq!(h.ledger.goal(&to.id).current_amount, dec!(0));
}

#[tokio::test]
async fn test_transient_conflicts_are_retried() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.ledger.inject_conflicts(2);
    let result = h.goals.deposit_to_goal(deposit(&goal.id, dec!(40))).await.unwrap();
    assert_eq!(result.goal.current_amount, dec!(40));
    assert_eq!(h.ledger.transactions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_do_not_lose_updates() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let goals = h.goals.clone();
            let goal_id = goal.id.clone();
            tokio::spawn(async move { goals.deposit_to_goal(deposit(&goal_id, dec!(10))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = h.ledger.goal(&goal.id);
    assert_eq!(stored.current_amount, dec!(40));
    assert_eq!(stored.version, 4);
}

#[tokio::test]
async fn test_interest_is_accrued_once_per_day() {
    let h = Harness::with_config(LedgerConfig {
        default_annual_rate: dec!(0.365),
        ..LedgerConfig::default()
    });
    let goal = h.goals.create_goal(new_goal("alice", dec!(100000))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&goal.id, dec!(10000))).await.unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    let first = h.goals.calculate_interest(&goal.id, day).await.unwrap();
    // 10000 * 0.365 / 365 = 10
    let interest = first.transaction.expect("interest entry");
    assert_eq!(interest.amount, dec!(10));
    assert_eq!(interest.transaction_type, TransactionType::Interest);
    assert_eq!(first.goal.current_amount, dec!(10010));
    assert_eq!(first.goal.total_interest_earned, dec!(10));

    let second = h.goals.calculate_interest(&goal.id, day).await.unwrap();
    assert!(second.transaction.is_none());
    assert_eq!(second.goal.current_amount, dec!(10010));

    let next_day = day.succ_opt().unwrap();
    let third = h.goals.calculate_interest(&goal.id, next_day).await.unwrap();
    assert!(third.transaction.is_some());
}

#[tokio::test]
async fn test_interest_below_one_unit_consumes_the_day() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&goal.id, dec!(100))).await.unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    let accrual = h.goals.calculate_interest(&goal.id, day).await.unwrap();
    assert!(accrual.transaction.is_none());
    assert_eq!(accrual.goal.current_amount, dec!(100));
    assert_eq!(accrual.goal.last_interest_accrued_on, Some(day));
}

#[tokio::test]
async fn test_quick_save_is_unique_and_undeletable() {
    let h = Harness::new();
    let first = h.goals.ensure_quick_save_goal("alice", usdc()).await.unwrap();
    let again = h.goals.ensure_quick_save_goal("alice", usdc()).await.unwrap();
    assert_eq!(first.id, again.id);

    let mut explicit = new_goal("alice", dec!(0));
    explicit.is_quick_save = true;
    assert!(matches!(
        h.goals.create_goal(explicit).await.unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        h.goals.delete_goal(&first.id).await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_delete_requires_empty_goal() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals.deposit_to_goal(deposit(&goal.id, dec!(10))).await.unwrap();
    assert!(h.goals.delete_goal(&goal.id).await.is_err());

    let empty = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    h.goals.delete_goal(&empty.id).await.unwrap();
    assert!(matches!(
        h.goals.get_goal(&empty.id).unwrap_err(),
        Error::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_failing_pending_deposit_reverts_balance() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let result = h.goals.deposit_to_goal(deposit(&goal.id, dec!(250))).await.unwrap();

    let failed = h
        .goals
        .fail_transaction(&result.transaction.id, "user rejected signature")
        .await
        .unwrap();

    assert_eq!(failed.status, TransactionStatus::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some("user rejected signature"));
    assert_eq!(h.ledger.goal(&goal.id).current_amount, dec!(0));
    assert!(h
        .goals
        .fail_transaction(&result.transaction.id, "again")
        .await
        .is_err());
}

#[tokio::test]
async fn test_create_goal_validates_input() {
    let h = Harness::new();
    let invalid = NewGoal {
        title: " ".to_string(),
        ..new_goal("alice", dec!(10))
    };
    assert!(matches!(
        h.goals.create_goal(invalid).await.unwrap_err(),
        Error::Validation(_)
    ));
}

struct FixedOracle(PriceQuote);

#[async_trait::async_trait]
impl PriceOracleTrait for FixedOracle {
    async fn latest_quote(
        &self,
        _token_symbol: &str,
        _quote_currency: &str,
    ) -> crate::errors::Result<PriceQuote> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_valuation_uses_fresh_quotes_only() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(0))).await.unwrap();
    h.goals
        .deposit_to_goal(deposit(&goal.id, dec!(2500000)))
        .await
        .unwrap();

    let quote = PriceQuote {
        token_symbol: "USDC".to_string(),
        quote_currency: "KES".to_string(),
        rate: dec!(130),
        timestamp: chrono::Utc::now(),
    };
    let fresh = crate::goals::GoalService::new(
        h.ledger.clone(),
        h.ledger.clone(),
        h.ledger.clone(),
        Arc::new(crate::events::NoOpDomainEventSink),
        LedgerConfig::default(),
    )
    .with_price_oracle(Arc::new(FixedOracle(quote.clone())));
    let valuation = fresh.value_goal(&goal.id, "KES").await.unwrap();
    assert_eq!(valuation.token_amount, dec!(2.5));
    assert_eq!(valuation.value, dec!(325));

    let stale = crate::goals::GoalService::new(
        h.ledger.clone(),
        h.ledger.clone(),
        h.ledger.clone(),
        Arc::new(crate::events::NoOpDomainEventSink),
        LedgerConfig::default(),
    )
    .with_price_oracle(Arc::new(FixedOracle(PriceQuote {
        timestamp: chrono::Utc::now() - chrono::Duration::hours(2),
        ..quote
    })));
    assert!(matches!(
        stale.value_goal(&goal.id, "KES").await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_deposit_past_decimal_range_is_rejected() {
    let h = Harness::new();
    let goal = h.goals.create_goal(new_goal("alice", dec!(1000))).await.unwrap();
    let huge = dec!(50000000000000000000000000000);
    h.goals.deposit_to_goal(deposit(&goal.id, huge)).await.unwrap();
    let before = h.ledger.goal(&goal.id);
    let tx_count = h.ledger.transactions().len();

    let err = h.goals.deposit_to_goal(deposit(&goal.id, huge)).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::AmountOutOfRange(_))
    ));
    assert_eq!(h.ledger.goal(&goal.id), before);
    assert_eq!(h.ledger.transactions().len(), tx_count);
}
