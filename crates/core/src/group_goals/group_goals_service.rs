use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::group_goals::group_goals_model::{
    GroupContributionRequest, GroupGoal, GroupGoalMember, GroupGoalWithTransaction,
    GroupLeaveResult, MemberRole, MemberStatus, NewGroupGoal,
};
use crate::group_goals::group_goals_traits::{GroupGoalRepositoryTrait, GroupGoalServiceTrait};
use crate::ledger::{
    retry_on_conflict, ChainConfirmation, ConfirmationResult, LedgerBatch, LedgerConfig,
    LedgerStoreTrait,
};
use crate::transactions::{
    SavingsTransaction, SavingsTransactionRepositoryTrait, TransactionStatus, TransactionType,
};
use crate::utils::amounts::{checked_balance_add, require_positive_amount};

/// Ledger engine for group goals.
///
/// Every mutation rewrites the whole group (members included) under the
/// group's version, so concurrent contributions serialize on the group.
pub struct GroupGoalService {
    group_goal_repository: Arc<dyn GroupGoalRepositoryTrait>,
    transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
    ledger_store: Arc<dyn LedgerStoreTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    config: LedgerConfig,
}

impl GroupGoalService {
    pub fn new(
        group_goal_repository: Arc<dyn GroupGoalRepositoryTrait>,
        transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
        ledger_store: Arc<dyn LedgerStoreTrait>,
        event_sink: Arc<dyn DomainEventSink>,
        config: LedgerConfig,
    ) -> Self {
        GroupGoalService {
            group_goal_repository,
            transaction_repository,
            ledger_store,
            event_sink,
            config,
        }
    }

    /// Recomputes derived fields, checks invariants and commits.
    async fn commit_group(
        &self,
        mut group_goal: GroupGoal,
        transactions: Vec<SavingsTransaction>,
    ) -> Result<GroupGoal> {
        group_goal.recompute();
        group_goal.check_invariants()?;
        let now = Utc::now();
        let mut batch = LedgerBatch::new();
        let group_goal = batch.update_group_goal(group_goal, now);
        for transaction in transactions {
            batch.insert_transaction(transaction);
        }
        self.ledger_store.commit(batch).await?;
        Ok(group_goal)
    }

    async fn try_join(&self, group_goal_id: &str, user_id: &str) -> Result<GroupGoal> {
        let mut group_goal = self.group_goal_repository.get_group_goal(group_goal_id)?;
        group_goal.ensure_active()?;
        if group_goal.member(user_id).is_some() {
            return Err(Error::MembershipViolation(format!(
                "User {} is already a member of group goal {}",
                user_id, group_goal.id
            )));
        }
        if group_goal.seats_taken() >= group_goal.max_members {
            return Err(Error::MembershipViolation(format!(
                "Group goal {} is full ({} members)",
                group_goal.id, group_goal.max_members
            )));
        }
        let status = if group_goal.requires_approval {
            MemberStatus::Pending
        } else {
            MemberStatus::Active
        };
        let member = GroupGoalMember::new(
            &group_goal.id,
            user_id,
            MemberRole::Member,
            status,
            Utc::now(),
        );
        group_goal.members.push(member);
        self.commit_group(group_goal, Vec::new()).await
    }

    async fn try_approve(
        &self,
        group_goal_id: &str,
        approver_id: &str,
        user_id: &str,
    ) -> Result<GroupGoal> {
        let mut group_goal = self.group_goal_repository.get_group_goal(group_goal_id)?;
        let approver = group_goal.require_member(approver_id)?;
        if approver.status != MemberStatus::Active || !approver.role.can_approve() {
            return Err(Error::MembershipViolation(format!(
                "User {} cannot approve members of group goal {}",
                approver_id, group_goal.id
            )));
        }
        if group_goal.member(user_id).map(|m| m.status) != Some(MemberStatus::Pending) {
            return Err(Error::MembershipViolation(format!(
                "User {} has no pending request for group goal {}",
                user_id, group_goal.id
            )));
        }
        let now = Utc::now();
        let member = group_goal.require_member_mut(user_id)?;
        member.status = MemberStatus::Active;
        member.updated_at = now;
        self.commit_group(group_goal, Vec::new()).await
    }

    async fn try_transfer_ownership(
        &self,
        group_goal_id: &str,
        owner_id: &str,
        new_owner_id: &str,
    ) -> Result<GroupGoal> {
        let mut group_goal = self.group_goal_repository.get_group_goal(group_goal_id)?;
        if group_goal.owner_id != owner_id {
            return Err(Error::MembershipViolation(format!(
                "User {} does not own group goal {}",
                owner_id, group_goal.id
            )));
        }
        if owner_id == new_owner_id {
            return Ok(group_goal);
        }
        if group_goal.member(new_owner_id).map(|m| m.status) != Some(MemberStatus::Active) {
            return Err(Error::MembershipViolation(format!(
                "Ownership can only pass to an active member; {} is not one",
                new_owner_id
            )));
        }
        let now = Utc::now();
        {
            let old_owner = group_goal.require_member_mut(owner_id)?;
            old_owner.role = MemberRole::Admin;
            old_owner.updated_at = now;
        }
        {
            let new_owner = group_goal.require_member_mut(new_owner_id)?;
            new_owner.role = MemberRole::Owner;
            new_owner.updated_at = now;
        }
        group_goal.owner_id = new_owner_id.to_string();
        self.commit_group(group_goal, Vec::new()).await
    }

    async fn try_leave(&self, group_goal_id: &str, user_id: &str) -> Result<GroupLeaveResult> {
        let mut group_goal = self.group_goal_repository.get_group_goal(group_goal_id)?;
        let member = group_goal.require_member(user_id)?;
        if member.role == MemberRole::Owner {
            return Err(Error::MembershipViolation(format!(
                "The owner of group goal {} must transfer ownership before leaving",
                group_goal.id
            )));
        }

        let now = Utc::now();
        let contribution = member.current_contribution;
        let refund_transaction = if contribution > Decimal::ZERO {
            Some(
                SavingsTransaction::new(
                    user_id,
                    TransactionType::Refund,
                    TransactionStatus::Pending,
                    contribution,
                    &group_goal.token.address,
                    now,
                )
                .for_group_goal(&group_goal.id),
            )
        } else {
            None
        };

        {
            let member = group_goal.require_member_mut(user_id)?;
            member.status = MemberStatus::Left;
            member.current_contribution = Decimal::ZERO;
            member.left_at = Some(now);
            member.updated_at = now;
        }
        group_goal.current_amount -= contribution;

        let group_goal = self
            .commit_group(group_goal, refund_transaction.iter().cloned().collect())
            .await?;
        Ok(GroupLeaveResult {
            group_goal,
            refund_transaction,
        })
    }

    async fn try_contribute(
        &self,
        request: &GroupContributionRequest,
    ) -> Result<GroupGoalWithTransaction> {
        let amount = require_positive_amount(request.amount)?;
        let mut group_goal = self
            .group_goal_repository
            .get_group_goal(&request.group_goal_id)?;
        group_goal.ensure_active()?;
        let member = group_goal.require_member(&request.user_id)?;
        if member.status != MemberStatus::Active {
            return Err(Error::MembershipViolation(format!(
                "User {} is {} in group goal {} and cannot contribute",
                request.user_id, member.status, group_goal.id
            )));
        }

        let now = Utc::now();
        let group_total = checked_balance_add(group_goal.current_amount, amount)?;
        {
            let member = group_goal.require_member_mut(&request.user_id)?;
            member.current_contribution = checked_balance_add(member.current_contribution, amount)?;
            member.updated_at = now;
        }
        group_goal.current_amount = group_total;

        let transaction = SavingsTransaction::new(
            &request.user_id,
            TransactionType::Contribution,
            TransactionStatus::Pending,
            amount,
            &group_goal.token.address,
            now,
        )
        .for_group_goal(&group_goal.id)
        .with_submission(request.submission.clone());

        let group_goal = self
            .commit_group(group_goal, vec![transaction.clone()])
            .await?;
        Ok(GroupGoalWithTransaction {
            group_goal,
            transaction,
        })
    }

    fn group_goal_id_of(transaction: &SavingsTransaction) -> Result<String> {
        transaction.group_goal_id.clone().ok_or_else(|| {
            Error::InvalidState(format!(
                "Transaction {} does not belong to a group goal",
                transaction.id
            ))
        })
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
        let group_goal_id = Self::group_goal_id_of(&confirmation.transaction)?;
        let user_id = confirmation.transaction.user_id.clone();

        let now = Utc::now();
        let mut group_goal = self.group_goal_repository.get_group_goal(&group_goal_id)?;
        let delta = confirmation.balance_delta()?;
        let transaction = confirmation.confirmed_transaction(now)?;
        let interest_transaction = confirmation.yield_transaction(now)?;
        let credit = checked_balance_add(
            delta,
            interest_transaction.as_ref().map_or(Decimal::ZERO, |t| t.amount),
        )?;

        let member_active =
            group_goal.member(&user_id).map(|m| m.status) == Some(MemberStatus::Active);
        let mut touched = false;
        if credit != Decimal::ZERO {
            if member_active {
                let group_total = checked_balance_add(group_goal.current_amount, credit)?;
                let member = group_goal.require_member_mut(&user_id)?;
                let contribution = checked_balance_add(member.current_contribution, credit)?;
                if contribution < Decimal::ZERO {
                    return Err(Error::InsufficientBalance {
                        goal_id: group_goal_id.clone(),
                        requested: -credit,
                        available: member.current_contribution,
                    });
                }
                member.current_contribution = contribution;
                member.updated_at = now;
                group_goal.current_amount = group_total;
                touched = true;
            } else {
                warn!(
                    "Chain amount for transaction {} differs by {} but user {} no longer holds an active share of group goal {}",
                    transaction.id, credit, user_id, group_goal.id
                );
            }
        }
        if let Some(interest) = &interest_transaction {
            group_goal.total_interest_earned =
                checked_balance_add(group_goal.total_interest_earned, interest.amount)?;
            touched = true;
        }

        let mut batch = LedgerBatch::new();
        if touched {
            group_goal.recompute();
            group_goal.check_invariants()?;
            batch.update_group_goal(group_goal, now);
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
        let group_goal_id = Self::group_goal_id_of(&transaction)?;
        let now = Utc::now();
        transaction.transition(TransactionStatus::Failed, now)?;
        transaction.failure_reason = Some(reason.to_string());

        let mut batch = LedgerBatch::new();
        match transaction.transaction_type {
            TransactionType::Contribution => {
                let mut group_goal = self.group_goal_repository.get_group_goal(&group_goal_id)?;
                {
                    let member = group_goal.require_member_mut(&transaction.user_id)?;
                    if member.current_contribution < transaction.amount {
                        return Err(Error::InsufficientBalance {
                            goal_id: group_goal_id.clone(),
                            requested: transaction.amount,
                            available: member.current_contribution,
                        });
                    }
                    member.current_contribution -= transaction.amount;
                    member.updated_at = now;
                }
                group_goal.current_amount -= transaction.amount;
                group_goal.recompute();
                group_goal.check_invariants()?;
                batch.update_group_goal(group_goal, now);
            }
            // The member already left; the failed refund stays on record as owed.
            TransactionType::Refund => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "{} transactions cannot be failed",
                    other
                )))
            }
        }
        batch.update_transaction(transaction.clone(), TransactionStatus::Pending);
        self.ledger_store.commit(batch).await?;
        Ok(transaction)
    }

    fn group_changed(&self, group_goal_id: &str) {
        self.event_sink
            .emit(DomainEvent::group_goal_changed(group_goal_id));
    }
}

#[async_trait]
impl GroupGoalServiceTrait for GroupGoalService {
    fn get_group_goal(&self, group_goal_id: &str) -> Result<GroupGoal> {
        self.group_goal_repository.get_group_goal(group_goal_id)
    }

    fn list_group_goals(&self, user_id: &str) -> Result<Vec<GroupGoal>> {
        self.group_goal_repository.list_group_goals_for_user(user_id)
    }

    fn list_group_goal_transactions(
        &self,
        group_goal_id: &str,
    ) -> Result<Vec<SavingsTransaction>> {
        self.group_goal_repository.get_group_goal(group_goal_id)?;
        self.transaction_repository.list_for_group_goal(group_goal_id)
    }

    async fn create_group_goal(&self, new_group_goal: NewGroupGoal) -> Result<GroupGoal> {
        new_group_goal.validate()?;
        let group_goal =
            GroupGoal::from_new(new_group_goal, self.config.group_member_cap, Utc::now());
        let group_goal = self
            .group_goal_repository
            .insert_group_goal(group_goal)
            .await?;
        info!(
            "Created group goal {} owned by {}",
            group_goal.id, group_goal.owner_id
        );
        self.group_changed(&group_goal.id);
        Ok(group_goal)
    }

    async fn join_group_goal(&self, group_goal_id: &str, user_id: &str) -> Result<GroupGoal> {
        let group_goal =
            retry_on_conflict("join group goal", || self.try_join(group_goal_id, user_id))
                .await?;
        debug!("User {} joined group goal {}", user_id, group_goal.id);
        self.group_changed(&group_goal.id);
        Ok(group_goal)
    }

    async fn approve_member(
        &self,
        group_goal_id: &str,
        approver_id: &str,
        user_id: &str,
    ) -> Result<GroupGoal> {
        let group_goal = retry_on_conflict("approve member", || {
            self.try_approve(group_goal_id, approver_id, user_id)
        })
        .await?;
        self.group_changed(&group_goal.id);
        Ok(group_goal)
    }

    async fn transfer_ownership(
        &self,
        group_goal_id: &str,
        owner_id: &str,
        new_owner_id: &str,
    ) -> Result<GroupGoal> {
        let group_goal = retry_on_conflict("transfer ownership", || {
            self.try_transfer_ownership(group_goal_id, owner_id, new_owner_id)
        })
        .await?;
        info!(
            "Group goal {} ownership moved from {} to {}",
            group_goal.id, owner_id, new_owner_id
        );
        self.group_changed(&group_goal.id);
        Ok(group_goal)
    }

    async fn leave_group_goal(
        &self,
        group_goal_id: &str,
        user_id: &str,
    ) -> Result<GroupLeaveResult> {
        let result =
            retry_on_conflict("leave group goal", || self.try_leave(group_goal_id, user_id))
                .await?;
        debug!("User {} left group goal {}", user_id, result.group_goal.id);
        self.group_changed(&result.group_goal.id);
        Ok(result)
    }

    async fn contribute_to_group_goal(
        &self,
        request: GroupContributionRequest,
    ) -> Result<GroupGoalWithTransaction> {
        let result = retry_on_conflict("contribute", || self.try_contribute(&request)).await?;
        debug!(
            "User {} contributed {} to group goal {}",
            request.user_id, request.amount, result.group_goal.id
        );
        self.group_changed(&result.group_goal.id);
        Ok(result)
    }

    async fn apply_confirmation(
        &self,
        confirmation: ChainConfirmation,
    ) -> Result<ConfirmationResult> {
        let result = retry_on_conflict("confirm group transaction", || {
            self.try_confirm(&confirmation)
        })
        .await?;
        if let Some(group_goal_id) = &result.transaction.group_goal_id {
            self.group_changed(group_goal_id);
        }
        Ok(result)
    }

    async fn fail_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<SavingsTransaction> {
        let transaction = retry_on_conflict("fail group transaction", || {
            self.try_fail(transaction_id, reason)
        })
        .await?;
        info!("Transaction {} failed: {}", transaction.id, reason);
        if let Some(group_goal_id) = &transaction.group_goal_id {
            self.group_changed(group_goal_id);
        }
        Ok(transaction)
    }
}
