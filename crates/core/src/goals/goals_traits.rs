use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::Result;
use crate::goals::goals_model::{
    Goal, GoalDepositRequest, GoalStatus, GoalTransferRequest, GoalTransferResult, GoalValuation,
    GoalWithTransaction, GoalWithdrawalRequest, InterestAccrual, NewGoal, TokenIdentity,
};
use crate::ledger::{ChainConfirmation, ConfirmationResult};
use crate::transactions::SavingsTransaction;

/// Trait for goal repository operations.
///
/// Balance changes are not written here; they go through the ledger store.
#[async_trait]
pub trait GoalRepositoryTrait: Send + Sync {
    fn get_goal(&self, goal_id: &str) -> Result<Goal>;
    fn list_goals_for_owner(&self, owner_id: &str) -> Result<Vec<Goal>>;
    fn find_quick_save_goal(&self, owner_id: &str) -> Result<Option<Goal>>;
    async fn insert_goal(&self, goal: Goal) -> Result<Goal>;
    /// Deletes the goal if its stored version still equals `expected_version`.
    async fn delete_goal(&self, goal_id: &str, expected_version: i64) -> Result<()>;
}

/// Single-owner ledger operations.
#[async_trait]
pub trait GoalServiceTrait: Send + Sync {
    fn get_goal(&self, goal_id: &str) -> Result<Goal>;
    fn list_goals(&self, owner_id: &str) -> Result<Vec<Goal>>;
    fn list_goal_transactions(&self, goal_id: &str) -> Result<Vec<SavingsTransaction>>;

    async fn create_goal(&self, new_goal: NewGoal) -> Result<Goal>;
    async fn ensure_quick_save_goal(&self, owner_id: &str, token: TokenIdentity) -> Result<Goal>;
    async fn update_goal_status(&self, goal_id: &str, status: GoalStatus) -> Result<Goal>;
    async fn delete_goal(&self, goal_id: &str) -> Result<()>;

    async fn deposit_to_goal(&self, request: GoalDepositRequest) -> Result<GoalWithTransaction>;
    async fn withdraw_from_goal(&self, request: GoalWithdrawalRequest)
        -> Result<GoalWithTransaction>;
    async fn transfer_between_goals(&self, request: GoalTransferRequest)
        -> Result<GoalTransferResult>;
    /// Accrues one day of interest for `as_of`. Repeated calls for the same
    /// day return the goal unchanged.
    async fn calculate_interest(&self, goal_id: &str, as_of: NaiveDate) -> Result<InterestAccrual>;
    async fn value_goal(&self, goal_id: &str, quote_currency: &str) -> Result<GoalValuation>;

    /// Finalizes a pending goal transaction against its chain event.
    async fn apply_confirmation(&self, confirmation: ChainConfirmation)
        -> Result<ConfirmationResult>;
    /// Moves a pending goal transaction to failed and reverts its balance effect.
    async fn fail_transaction(&self, transaction_id: &str, reason: &str)
        -> Result<SavingsTransaction>;
}
