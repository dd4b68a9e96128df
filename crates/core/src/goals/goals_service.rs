use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::constants::DAYS_PER_YEAR;
use crate::errors::{DatabaseError, Error, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::goals::goals_model::{
    Goal, GoalDepositRequest, GoalStatus, GoalTransferRequest, GoalTransferResult, GoalValuation,
    GoalWithTransaction, GoalWithdrawalRequest, InterestAccrual, NewGoal, TokenIdentity,
};
use crate::goals::goals_traits::{GoalRepositoryTrait, GoalServiceTrait};
use crate::ledger::{
    retry_on_conflict, ChainConfirmation, ConfirmationResult, LedgerBatch, LedgerConfig,
    LedgerStoreTrait,
};
use crate::pricing::PriceOracleTrait;
use crate::transactions::{
    SavingsTransaction, SavingsTransactionRepositoryTrait, TransactionStatus, TransactionType,
};
use crate::utils::amounts::{require_positive_amount, token_unit};

/// Ledger engine for single-owner goals.
///
/// Balances are applied when the operation is requested; chain confirmation
/// later patches metadata and corrects the amount if the chain disagrees.
pub struct GoalService {
    goal_repository: Arc<dyn GoalRepositoryTrait>,
    transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
    ledger_store: Arc<dyn LedgerStoreTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    price_oracle: Option<Arc<dyn PriceOracleTrait>>,
    config: LedgerConfig,
}

impl GoalService {
    pub fn new(
        goal_repository: Arc<dyn GoalRepositoryTrait>,
        transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
        ledger_store: Arc<dyn LedgerStoreTrait>,
        event_sink: Arc<dyn DomainEventSink>,
        config: LedgerConfig,
    ) -> Self {
        GoalService {
            goal_repository,
            transaction_repository,
            ledger_store,
            event_sink,
            price_oracle: None,
            config,
        }
    }

    pub fn with_price_oracle(mut self, price_oracle: Arc<dyn PriceOracleTrait>) -> Self {
        self.price_oracle = Some(price_oracle);
        self
    }

    fn goal_changed(&self, goal_ids: Vec<String>) {
        self.event_sink.emit(DomainEvent::goals_changed(goal_ids));
    }

    async fn try_deposit(&self, request: &GoalDepositRequest) -> Result<GoalWithTransaction> {
        let amount = require_positive_amount(request.amount)?;
        let mut goal = self.goal_repository.get_goal(&request.goal_id)?;
        goal.ensure_accepts_deposits()?;

        let now = Utc::now();
        goal.credit(amount)?;
        let transaction = SavingsTransaction::new(
            &goal.owner_id,
            TransactionType::Deposit,
            TransactionStatus::Pending,
            amount,
            &goal.token.address,
            now,
        )
        .for_goal(&goal.id)
        .with_submission(request.submission.clone());

        let mut batch = LedgerBatch::new();
        let goal = batch.update_goal(goal, now);
        batch.insert_transaction(transaction.clone());
        self.ledger_store.commit(batch).await?;

        Ok(GoalWithTransaction { goal, transaction })
    }

    async fn try_withdraw(&self, request: &GoalWithdrawalRequest) -> Result<GoalWithTransaction> {
        let amount = require_positive_amount(request.amount)?;
        let mut goal = self.goal_repository.get_goal(&request.goal_id)?;
        goal.ensure_not_cancelled()?;

        let now = Utc::now();
        goal.debit(amount)?;
        let transaction = SavingsTransaction::new(
            &goal.owner_id,
            TransactionType::Withdrawal,
            TransactionStatus::Pending,
            amount,
            &goal.token.address,
            now,
        )
        .for_goal(&goal.id)
        .with_submission(request.submission.clone());

        let mut batch = LedgerBatch::new();
        let goal = batch.update_goal(goal, now);
        batch.insert_transaction(transaction.clone());
        self.ledger_store.commit(batch).await?;

        Ok(GoalWithTransaction { goal, transaction })
    }

    async fn try_transfer(&self, request: &GoalTransferRequest) -> Result<GoalTransferResult> {
        if request.from_goal_id == request.to_goal_id {
            return Err(Error::InvalidState(
                "Cannot transfer a goal's balance to itself".to_string(),
            ));
        }
        let amount = require_positive_amount(request.amount)?;
        let mut from_goal = self.goal_repository.get_goal(&request.from_goal_id)?;
        let mut to_goal = self.goal_repository.get_goal(&request.to_goal_id)?;

        if !from_goal.token.same_token(&to_goal.token) {
            return Err(Error::TokenMismatch {
                source_token: from_goal.token.to_string(),
                target_token: to_goal.token.to_string(),
            });
        }
        if from_goal.owner_id != to_goal.owner_id {
            return Err(Error::InvalidState(format!(
                "Goals {} and {} belong to different owners",
                from_goal.id, to_goal.id
            )));
        }
        from_goal.ensure_not_cancelled()?;
        to_goal.ensure_accepts_deposits()?;

        let now = Utc::now();
        from_goal.debit(amount)?;
        to_goal.credit(amount)?;
        let transaction = SavingsTransaction::new(
            &from_goal.owner_id,
            TransactionType::Transfer,
            TransactionStatus::Completed,
            amount,
            &from_goal.token.address,
            now,
        )
        .between_goals(&from_goal.id, &to_goal.id);

        let mut batch = LedgerBatch::new();
        let from_goal = batch.update_goal(from_goal, now);
        let to_goal = batch.update_goal(to_goal, now);
        batch.insert_transaction(transaction.clone());
        self.ledger_store.commit(batch).await?;

        Ok(GoalTransferResult {
            from_goal,
            to_goal,
            transaction,
        })
    }

    async fn try_accrue_interest(&self, goal_id: &str, as_of: NaiveDate) -> Result<InterestAccrual> {
        let mut goal = self.goal_repository.get_goal(goal_id)?;
        if goal.status != GoalStatus::Active {
            return Err(Error::InvalidState(format!(
                "Goal {} is {} and does not accrue interest",
                goal.id, goal.status
            )));
        }
        if goal.last_interest_accrued_on.is_some_and(|last| last >= as_of) {
            debug!("Interest for goal {} already accrued on {}", goal.id, as_of);
            return Ok(InterestAccrual {
                goal,
                transaction: None,
                accrued_on: as_of,
            });
        }

        let daily_rate = goal.annual_interest_rate / Decimal::from(DAYS_PER_YEAR);
        let interest = goal
            .current_amount
            .checked_mul(daily_rate)
            .ok_or_else(|| {
                ValidationError::AmountOutOfRange(format!(
                    "interest on {} at {}",
                    goal.current_amount, goal.annual_interest_rate
                ))
            })?
            .trunc();
        let now = Utc::now();
        goal.last_interest_accrued_on = Some(as_of);

        let mut batch = LedgerBatch::new();
        let transaction = if interest > Decimal::ZERO {
            goal.credit_interest(interest)?;
            let transaction = SavingsTransaction::new(
                &goal.owner_id,
                TransactionType::Interest,
                TransactionStatus::Completed,
                interest,
                &goal.token.address,
                now,
            )
            .for_goal(&goal.id);
            batch.insert_transaction(transaction.clone());
            Some(transaction)
        } else {
            None
        };
        let goal = batch.update_goal(goal, now);
        self.ledger_store.commit(batch).await?;

        Ok(InterestAccrual {
            goal,
            transaction,
            accrued_on: as_of,
        })
    }

    async fn try_update_status(&self, goal_id: &str, status: GoalStatus) -> Result<Goal> {
        let mut goal = self.goal_repository.get_goal(goal_id)?;
        if goal.status == status {
            return Ok(goal);
        }
        let now = Utc::now();
        goal.set_status(status, now)?;

        let mut batch = LedgerBatch::new();
        let goal = batch.update_goal(goal, now);
        self.ledger_store.commit(batch).await?;
        Ok(goal)
    }

    async fn try_delete(&self, goal_id: &str) -> Result<()> {
        let goal = self.goal_repository.get_goal(goal_id)?;
        if goal.is_quick_save {
            return Err(Error::InvalidState(format!(
                "Goal {} is the owner's quick-save goal and cannot be deleted",
                goal.id
            )));
        }
        if goal.current_amount != Decimal::ZERO {
            return Err(Error::InvalidState(format!(
                "Goal {} still holds {} and cannot be deleted",
                goal.id, goal.current_amount
            )));
        }
        let has_pending = self
            .transaction_repository
            .list_for_goal(&goal.id)?
            .iter()
            .any(SavingsTransaction::is_pending);
        if has_pending {
            return Err(Error::InvalidState(format!(
                "Goal {} has pending transactions",
                goal.id
            )));
        }
        self.goal_repository
            .delete_goal(&goal.id, goal.version)
            .await
    }

    async fn try_confirm(&self, confirmation: &ChainConfirmation) -> Result<ConfirmationResult> {
        let current = self
            .transaction_repository
            .get_transaction(&confirmation.transaction.id)?;
        if !current.is_pending() {
            return Err(Error::InvalidState(format!(
                "Transaction {} is {} and cannot be confirmed",
                current.id, current.status
            )));
        }
        let confirmation = ChainConfirmation {
            transaction: current,
            ..confirmation.clone()
        };
        let goal_id = confirmation
            .transaction
            .goal_id
            .clone()
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "Transaction {} does not belong to a goal",
                    confirmation.transaction.id
                ))
            })?;

        let now = Utc::now();
        let mut goal = self.goal_repository.get_goal(&goal_id)?;
        let delta = confirmation.balance_delta()?;
        goal.adjust(delta)?;
        let transaction = confirmation.confirmed_transaction(now)?;
        let interest_transaction = confirmation.yield_transaction(now)?;
        if let Some(interest) = &interest_transaction {
            goal.credit_interest(interest.amount)?;
        }

        let mut batch = LedgerBatch::new();
        if delta != Decimal::ZERO || interest_transaction.is_some() {
            batch.update_goal(goal, now);
        }
        batch.update_transaction(transaction.clone(), TransactionStatus::Pending);
        if let Some(interest) = &interest_transaction {
            batch.insert_transaction(interest.clone());
        }
        batch.mark_matched(confirmation.audit_match(now));
        self.ledger_store.commit(batch).await?;

        Ok(ConfirmationResult {
            transaction,
            interest_transaction,
        })
    }

    async fn try_fail(&self, transaction_id: &str, reason: &str) -> Result<SavingsTransaction> {
        let mut transaction = self.transaction_repository.get_transaction(transaction_id)?;
        let goal_id = transaction.goal_id.clone().ok_or_else(|| {
            Error::InvalidState(format!(
                "Transaction {} does not belong to a goal",
                transaction.id
            ))
        })?;
        let now = Utc::now();
        transaction.transition(TransactionStatus::Failed, now)?;
        transaction.failure_reason = Some(reason.to_string());

        let mut goal = self.goal_repository.get_goal(&goal_id)?;
        match transaction.transaction_type {
            TransactionType::Deposit => goal.debit(transaction.amount)?,
            TransactionType::Withdrawal => goal.credit(transaction.amount)?,
            other => {
                return Err(Error::InvalidState(format!(
                    "{} transactions cannot be failed",
                    other
                )))
            }
        }

        let mut batch = LedgerBatch::new();
        batch.update_goal(goal, now);
        batch.update_transaction(transaction.clone(), TransactionStatus::Pending);
        self.ledger_store.commit(batch).await?;
        Ok(transaction)
    }
}

#[async_trait]
impl GoalServiceTrait for GoalService {
    fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        self.goal_repository.get_goal(goal_id)
    }

    fn list_goals(&self, owner_id: &str) -> Result<Vec<Goal>> {
        self.goal_repository.list_goals_for_owner(owner_id)
    }

    fn list_goal_transactions(&self, goal_id: &str) -> Result<Vec<SavingsTransaction>> {
        self.goal_repository.get_goal(goal_id)?;
        self.transaction_repository.list_for_goal(goal_id)
    }

    async fn create_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        new_goal.validate()?;
        if new_goal.is_quick_save
            && self
                .goal_repository
                .find_quick_save_goal(&new_goal.owner_id)?
                .is_some()
        {
            return Err(Error::InvalidState(format!(
                "Owner {} already has a quick-save goal",
                new_goal.owner_id
            )));
        }
        let goal = Goal::from_new(new_goal, self.config.default_annual_rate, Utc::now());
        let goal = self.goal_repository.insert_goal(goal).await?;
        info!("Created goal {} for owner {}", goal.id, goal.owner_id);
        self.goal_changed(vec![goal.id.clone()]);
        Ok(goal)
    }

    async fn ensure_quick_save_goal(&self, owner_id: &str, token: TokenIdentity) -> Result<Goal> {
        if let Some(goal) = self.goal_repository.find_quick_save_goal(owner_id)? {
            return Ok(goal);
        }
        let new_goal = NewGoal {
            id: None,
            owner_id: owner_id.to_string(),
            title: "Quick Save".to_string(),
            description: None,
            token,
            target_amount: Decimal::ZERO,
            annual_interest_rate: None,
            is_quick_save: true,
        };
        new_goal.validate()?;
        let goal = Goal::from_new(new_goal, self.config.default_annual_rate, Utc::now());
        match self.goal_repository.insert_goal(goal).await {
            Ok(goal) => {
                self.goal_changed(vec![goal.id.clone()]);
                Ok(goal)
            }
            // Lost a race with a concurrent onboarding request.
            Err(Error::Database(DatabaseError::UniqueViolation(_))) => self
                .goal_repository
                .find_quick_save_goal(owner_id)?
                .ok_or_else(|| Error::not_found("quick-save goal", owner_id)),
            Err(err) => Err(err),
        }
    }

    async fn update_goal_status(&self, goal_id: &str, status: GoalStatus) -> Result<Goal> {
        let goal = retry_on_conflict("update goal status", || {
            self.try_update_status(goal_id, status)
        })
        .await?;
        self.goal_changed(vec![goal.id.clone()]);
        Ok(goal)
    }

    async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        retry_on_conflict("delete goal", || self.try_delete(goal_id)).await?;
        info!("Deleted goal {}", goal_id);
        self.goal_changed(vec![goal_id.to_string()]);
        Ok(())
    }

    async fn deposit_to_goal(&self, request: GoalDepositRequest) -> Result<GoalWithTransaction> {
        let result = retry_on_conflict("deposit", || self.try_deposit(&request)).await?;
        debug!(
            "Deposited {} into goal {} (tx {})",
            result.transaction.amount, result.goal.id, result.transaction.id
        );
        self.goal_changed(vec![result.goal.id.clone()]);
        Ok(result)
    }

    async fn withdraw_from_goal(
        &self,
        request: GoalWithdrawalRequest,
    ) -> Result<GoalWithTransaction> {
        let result = retry_on_conflict("withdraw", || self.try_withdraw(&request)).await?;
        debug!(
            "Withdrew {} from goal {} (tx {})",
            result.transaction.amount, result.goal.id, result.transaction.id
        );
        self.goal_changed(vec![result.goal.id.clone()]);
        Ok(result)
    }

    async fn transfer_between_goals(
        &self,
        request: GoalTransferRequest,
    ) -> Result<GoalTransferResult> {
        let result = retry_on_conflict("transfer", || self.try_transfer(&request)).await?;
        self.goal_changed(vec![result.from_goal.id.clone(), result.to_goal.id.clone()]);
        Ok(result)
    }

    async fn calculate_interest(&self, goal_id: &str, as_of: NaiveDate) -> Result<InterestAccrual> {
        let accrual =
            retry_on_conflict("accrue interest", || self.try_accrue_interest(goal_id, as_of))
                .await?;
        if accrual.transaction.is_some() {
            self.goal_changed(vec![accrual.goal.id.clone()]);
        }
        Ok(accrual)
    }

    async fn value_goal(&self, goal_id: &str, quote_currency: &str) -> Result<GoalValuation> {
        let oracle = self
            .price_oracle
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No price oracle is configured".to_string()))?;
        let goal = self.goal_repository.get_goal(goal_id)?;
        let quote = oracle
            .latest_quote(&goal.token.symbol, quote_currency)
            .await?;
        quote.ensure_fresh(self.config.price_staleness_secs, Utc::now())?;

        let unit = token_unit(goal.token.decimals).ok_or_else(|| {
            Error::InvalidState(format!(
                "Token {} has unsupported decimals {}",
                goal.token, goal.token.decimals
            ))
        })?;
        let token_amount = goal.current_amount / unit;
        Ok(GoalValuation {
            goal_id: goal.id,
            quote_currency: quote.quote_currency,
            token_amount,
            rate: quote.rate,
            value: token_amount * quote.rate,
            quoted_at: quote.timestamp,
        })
    }

    async fn apply_confirmation(
        &self,
        confirmation: ChainConfirmation,
    ) -> Result<ConfirmationResult> {
        let result =
            retry_on_conflict("confirm goal transaction", || self.try_confirm(&confirmation))
                .await?;
        if let Some(goal_id) = &result.transaction.goal_id {
            self.goal_changed(vec![goal_id.clone()]);
        }
        Ok(result)
    }

    async fn fail_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<SavingsTransaction> {
        let transaction =
            retry_on_conflict("fail goal transaction", || self.try_fail(transaction_id, reason))
                .await?;
        info!("Transaction {} failed: {}", transaction.id, reason);
        if let Some(goal_id) = &transaction.goal_id {
            self.goal_changed(vec![goal_id.clone()]);
        }
        Ok(transaction)
    }
}
