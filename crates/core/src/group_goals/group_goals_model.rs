//! Group goal domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::contribution_shares::allocate_percentages;
use crate::constants::PERCENT_SUM_TOLERANCE;
use crate::errors::{Error, Result, ValidationError};
use crate::goals::{compute_progress, GoalStatus, TokenIdentity};
use crate::transactions::{ChainSubmission, SavingsTransaction};
use crate::utils::decimal_serde::{amount_serde, percent_serde};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
            MemberRole::Viewer => "viewer",
        }
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "owner" => Ok(MemberRole::Owner),
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            "viewer" => Ok(MemberRole::Viewer),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown member role '{}'",
                other
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Pending,
    Suspended,
    Left,
    Removed,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Pending => "pending",
            MemberStatus::Suspended => "suspended",
            MemberStatus::Left => "left",
            MemberStatus::Removed => "removed",
        }
    }

    /// Left and removed records are closed for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, MemberStatus::Left | MemberStatus::Removed)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "pending" => Ok(MemberStatus::Pending),
            "suspended" => Ok(MemberStatus::Suspended),
            "left" => Ok(MemberStatus::Left),
            "removed" => Ok(MemberStatus::Removed),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown member status '{}'",
                other
            ))
            .into()),
        }
    }
}

/// One membership record. Rejoining after leaving creates a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGoalMember {
    pub id: String,
    pub group_goal_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    #[serde(with = "amount_serde")]
    pub current_contribution: Decimal,
    #[serde(with = "percent_serde")]
    pub contribution_percentage: Decimal,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl GroupGoalMember {
    pub fn new(
        group_goal_id: &str,
        user_id: &str,
        role: MemberRole,
        status: MemberStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_goal_id: group_goal_id.to_string(),
            user_id: user_id.to_string(),
            role,
            status,
            current_contribution: Decimal::ZERO,
            contribution_percentage: Decimal::ZERO,
            joined_at: now,
            updated_at: now,
            left_at: None,
        }
    }
}

/// Multi-party savings goal with its ordered membership list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGoal {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub token: TokenIdentity,
    #[serde(with = "amount_serde")]
    pub current_amount: Decimal,
    #[serde(with = "amount_serde")]
    pub target_amount: Decimal,
    #[serde(with = "percent_serde")]
    pub progress: Decimal,
    pub status: GoalStatus,
    pub requires_approval: bool,
    pub max_members: u32,
    pub active_members: u32,
    #[serde(with = "amount_serde")]
    pub total_interest_earned: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub members: Vec<GroupGoalMember>,
}

impl GroupGoal {
    /// Builds a new group with its creator as the active owner.
    pub fn from_new(new_group: NewGroupGoal, member_cap: u32, now: DateTime<Utc>) -> Self {
        let id = new_group.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let owner = GroupGoalMember::new(
            &id,
            &new_group.owner_id,
            MemberRole::Owner,
            MemberStatus::Active,
            now,
        );
        let max_members = new_group
            .max_members
            .map(|m| m.min(member_cap))
            .unwrap_or(member_cap);
        Self {
            id,
            owner_id: new_group.owner_id,
            title: new_group.title,
            description: new_group.description,
            token: TokenIdentity::new(
                &new_group.token.address,
                &new_group.token.symbol,
                new_group.token.decimals,
            ),
            current_amount: Decimal::ZERO,
            target_amount: new_group.target_amount,
            progress: Decimal::ZERO,
            status: GoalStatus::Active,
            requires_approval: new_group.requires_approval,
            max_members,
            active_members: 1,
            total_interest_earned: Decimal::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            members: vec![owner],
        }
    }

    /// The user's open membership record, if any.
    pub fn member(&self, user_id: &str) -> Option<&GroupGoalMember> {
        self.members
            .iter()
            .rev()
            .find(|m| m.user_id == user_id && !m.status.is_closed())
    }

    pub fn member_mut(&mut self, user_id: &str) -> Option<&mut GroupGoalMember> {
        self.members
            .iter_mut()
            .rev()
            .find(|m| m.user_id == user_id && !m.status.is_closed())
    }

    pub fn require_member(&self, user_id: &str) -> Result<&GroupGoalMember> {
        self.member(user_id).ok_or_else(|| {
            Error::MembershipViolation(format!(
                "User {} is not a member of group goal {}",
                user_id, self.id
            ))
        })
    }

    pub fn require_member_mut(&mut self, user_id: &str) -> Result<&mut GroupGoalMember> {
        let group_goal_id = self.id.clone();
        self.member_mut(user_id).ok_or_else(|| {
            Error::MembershipViolation(format!(
                "User {} is not a member of group goal {}",
                user_id, group_goal_id
            ))
        })
    }

    /// Open records (active, pending, suspended) count against the cap.
    pub fn seats_taken(&self) -> u32 {
        self.members.iter().filter(|m| !m.status.is_closed()).count() as u32
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.status != GoalStatus::Active {
            return Err(Error::InvalidState(format!(
                "Group goal {} is {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Recomputes progress, the active member count and every member's
    /// contribution percentage.
    pub fn recompute(&mut self) {
        self.progress = compute_progress(self.current_amount, self.target_amount);
        self.active_members = self
            .members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .count() as u32;

        let contributions: Vec<Decimal> = self
            .members
            .iter()
            .map(|m| {
                if m.status == MemberStatus::Active {
                    m.current_contribution
                } else {
                    Decimal::ZERO
                }
            })
            .collect();
        let shares = allocate_percentages(&contributions);
        for (member, share) in self.members.iter_mut().zip(shares) {
            member.contribution_percentage = share;
        }
    }

    /// Contribution and percentage invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let contributed: Decimal = self
            .members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .map(|m| m.current_contribution)
            .sum();
        if contributed != self.current_amount {
            return Err(Error::Unexpected(format!(
                "Group goal {} holds {} but active members contributed {}",
                self.id, self.current_amount, contributed
            )));
        }
        if self.current_amount > Decimal::ZERO {
            let total: Decimal = self.members.iter().map(|m| m.contribution_percentage).sum();
            let tolerance = Decimal::from_str(PERCENT_SUM_TOLERANCE)?;
            if (total - Decimal::ONE_HUNDRED).abs() > tolerance {
                return Err(Error::Unexpected(format!(
                    "Contribution shares of group goal {} sum to {}",
                    self.id, total
                )));
            }
        }
        Ok(())
    }

    pub fn set_status(&mut self, next: GoalStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "Group goal {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        if next == GoalStatus::Cancelled && self.current_amount > Decimal::ZERO {
            return Err(Error::InvalidState(format!(
                "Group goal {} still holds {} and cannot be cancelled",
                self.id, self.current_amount
            )));
        }
        if next == GoalStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewGroupGoal {
    pub id: Option<String>,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub token: TokenIdentity,
    #[serde(with = "amount_serde")]
    pub target_amount: Decimal,
    #[serde(default)]
    pub requires_approval: bool,
    pub max_members: Option<u32>,
}

impl NewGroupGoal {
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(ValidationError::MissingField("ownerId".to_string()).into());
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()).into());
        }
        if self.token.address.trim().is_empty() {
            return Err(ValidationError::MissingField("token.address".to_string()).into());
        }
        if self.target_amount < Decimal::ZERO || self.target_amount.fract() != Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(self.target_amount.to_string()).into());
        }
        if self.max_members == Some(0) {
            return Err(ValidationError::InvalidInput(
                "maxMembers must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupContributionRequest {
    pub group_goal_id: String,
    pub user_id: String,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub submission: Option<ChainSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGoalWithTransaction {
    pub group_goal: GroupGoal,
    pub transaction: SavingsTransaction,
}

/// Result of leaving a group. A refund is created when the member had
/// contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLeaveResult {
    pub group_goal: GroupGoal,
    pub refund_transaction: Option<SavingsTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn group(requires_approval: bool) -> GroupGoal {
        GroupGoal::from_new(
            NewGroupGoal {
                id: Some("gg1".to_string()),
                owner_id: "alice".to_string(),
                title: "Trip".to_string(),
                description: None,
                token: TokenIdentity::new("0xusdc", "USDC", 6),
                target_amount: dec!(1000),
                requires_approval,
                max_members: Some(500),
            },
            50,
            Utc::now(),
        )
    }

    #[test]
    fn test_creator_is_active_owner_and_cap_is_clamped() {
        let g = group(false);
        assert_eq!(g.max_members, 50);
        assert_eq!(g.active_members, 1);
        let owner = g.member("alice").unwrap();
        assert_eq!(owner.role, MemberRole::Owner);
        assert_eq!(owner.status, MemberStatus::Active);
    }

    #[test]
    fn test_closed_records_are_skipped_by_lookup() {
        let mut g = group(false);
        let now = Utc::now();
        let mut old = GroupGoalMember::new("gg1", "bob", MemberRole::Member, MemberStatus::Left, now);
        old.left_at = Some(now);
        g.members.push(old);
        assert!(g.member("bob").is_none());
        g.members.push(GroupGoalMember::new(
            "gg1",
            "bob",
            MemberRole::Member,
            MemberStatus::Active,
            now,
        ));
        assert_eq!(g.member("bob").unwrap().status, MemberStatus::Active);
        assert_eq!(g.seats_taken(), 2);
    }

    #[test]
    fn test_invariant_detects_drift() {
        let mut g = group(false);
        g.current_amount = dec!(10);
        assert!(g.check_invariants().is_err());
        g.require_member_mut("alice").unwrap().current_contribution = dec!(10);
        g.recompute();
        g.check_invariants().unwrap();
        assert_eq!(g.members[0].contribution_percentage, dec!(100));
    }
}
