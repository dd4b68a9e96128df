use async_trait::async_trait;

use crate::errors::Result;
use crate::group_goals::group_goals_model::{
    GroupContributionRequest, GroupGoal, GroupGoalWithTransaction, GroupLeaveResult, NewGroupGoal,
};
use crate::ledger::{ChainConfirmation, ConfirmationResult};
use crate::transactions::SavingsTransaction;

/// Group goals are loaded and stored together with their members.
#[async_trait]
pub trait GroupGoalRepositoryTrait: Send + Sync {
    fn get_group_goal(&self, group_goal_id: &str) -> Result<GroupGoal>;
    /// Groups where the user holds an open membership record.
    fn list_group_goals_for_user(&self, user_id: &str) -> Result<Vec<GroupGoal>>;
    async fn insert_group_goal(&self, group_goal: GroupGoal) -> Result<GroupGoal>;
}

/// Multi-party ledger operations.
#[async_trait]
pub trait GroupGoalServiceTrait: Send + Sync {
    fn get_group_goal(&self, group_goal_id: &str) -> Result<GroupGoal>;
    fn list_group_goals(&self, user_id: &str) -> Result<Vec<GroupGoal>>;
    fn list_group_goal_transactions(&self, group_goal_id: &str)
        -> Result<Vec<SavingsTransaction>>;

    async fn create_group_goal(&self, new_group_goal: NewGroupGoal) -> Result<GroupGoal>;
    async fn join_group_goal(&self, group_goal_id: &str, user_id: &str) -> Result<GroupGoal>;
    async fn approve_member(
        &self,
        group_goal_id: &str,
        approver_id: &str,
        user_id: &str,
    ) -> Result<GroupGoal>;
    async fn transfer_ownership(
        &self,
        group_goal_id: &str,
        owner_id: &str,
        new_owner_id: &str,
    ) -> Result<GroupGoal>;
    async fn leave_group_goal(&self, group_goal_id: &str, user_id: &str)
        -> Result<GroupLeaveResult>;
    async fn contribute_to_group_goal(
        &self,
        request: GroupContributionRequest,
    ) -> Result<GroupGoalWithTransaction>;

    /// Finalizes a pending contribution or refund against its chain event.
    async fn apply_confirmation(&self, confirmation: ChainConfirmation)
        -> Result<ConfirmationResult>;
    async fn fail_transaction(&self, transaction_id: &str, reason: &str)
        -> Result<SavingsTransaction>;
}
