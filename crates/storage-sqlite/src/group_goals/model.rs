//! Database models for group goals and their membership records.

use diesel::prelude::*;
use std::str::FromStr;

use vaultledger_core::goals::{GoalStatus, TokenIdentity};
use vaultledger_core::group_goals::{GroupGoal, GroupGoalMember, MemberRole, MemberStatus};
use vaultledger_core::{Error, Result};

use crate::utils::{
    format_decimal, format_timestamp, from_db_u32, from_db_u8, parse_decimal, parse_timestamp,
    parse_timestamp_opt, to_db_u32,
};

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::group_goals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct GroupGoalDB {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub token_address: String,
    pub token_symbol: String,
    pub token_decimals: i32,
    pub current_amount: String,
    pub target_amount: String,
    pub progress: String,
    pub status: String,
    pub requires_approval: bool,
    pub max_members: i32,
    pub active_members: i32,
    pub total_interest_earned: String,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    Associations,
    AsChangeset,
    Selectable,
    PartialEq,
    Debug,
    Clone,
)]
#[diesel(belongs_to(GroupGoalDB, foreign_key = group_goal_id))]
#[diesel(table_name = crate::schema::group_goal_members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct GroupGoalMemberDB {
    pub id: String,
    pub group_goal_id: String,
    pub user_id: String,
    pub role: String,
    pub status: String,
    pub current_contribution: String,
    pub contribution_percentage: String,
    pub position: i32,
    pub joined_at: String,
    pub updated_at: String,
    pub left_at: Option<String>,
}

impl GroupGoalDB {
    pub fn from_domain(group: &GroupGoal) -> Result<Self> {
        Ok(Self {
            id: group.id.clone(),
            owner_id: group.owner_id.clone(),
            title: group.title.clone(),
            description: group.description.clone(),
            token_address: group.token.address.clone(),
            token_symbol: group.token.symbol.clone(),
            token_decimals: i32::from(group.token.decimals),
            current_amount: format_decimal(group.current_amount),
            target_amount: format_decimal(group.target_amount),
            progress: format_decimal(group.progress),
            status: group.status.as_str().to_string(),
            requires_approval: group.requires_approval,
            max_members: to_db_u32("group_goals.max_members", group.max_members)?,
            active_members: to_db_u32("group_goals.active_members", group.active_members)?,
            total_interest_earned: format_decimal(group.total_interest_earned),
            version: group.version,
            created_at: format_timestamp(group.created_at),
            updated_at: format_timestamp(group.updated_at),
            completed_at: group.completed_at.map(format_timestamp),
        })
    }

    /// Rebuilds the aggregate; `members` must already be in position order.
    pub fn into_domain(self, members: Vec<GroupGoalMemberDB>) -> Result<GroupGoal> {
        let members = members
            .into_iter()
            .map(GroupGoalMember::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupGoal {
            token: TokenIdentity {
                address: self.token_address,
                symbol: self.token_symbol,
                decimals: from_db_u8("group_goals.token_decimals", self.token_decimals)?,
            },
            current_amount: parse_decimal("group_goals.current_amount", &self.current_amount)?,
            target_amount: parse_decimal("group_goals.target_amount", &self.target_amount)?,
            progress: parse_decimal("group_goals.progress", &self.progress)?,
            status: GoalStatus::from_str(&self.status)?,
            max_members: from_db_u32("group_goals.max_members", self.max_members)?,
            active_members: from_db_u32("group_goals.active_members", self.active_members)?,
            total_interest_earned: parse_decimal(
                "group_goals.total_interest_earned",
                &self.total_interest_earned,
            )?,
            created_at: parse_timestamp("group_goals.created_at", &self.created_at)?,
            updated_at: parse_timestamp("group_goals.updated_at", &self.updated_at)?,
            completed_at: parse_timestamp_opt(
                "group_goals.completed_at",
                self.completed_at.as_deref(),
            )?,
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            requires_approval: self.requires_approval,
            version: self.version,
            members,
        })
    }
}

impl GroupGoalMemberDB {
    pub fn from_domain(member: &GroupGoalMember, position: usize) -> Result<Self> {
        let position = i32::try_from(position).map_err(|_| {
            Error::InvalidState(format!("member position {} out of range", position))
        })?;
        Ok(Self {
            id: member.id.clone(),
            group_goal_id: member.group_goal_id.clone(),
            user_id: member.user_id.clone(),
            role: member.role.as_str().to_string(),
            status: member.status.as_str().to_string(),
            current_contribution: format_decimal(member.current_contribution),
            contribution_percentage: format_decimal(member.contribution_percentage),
            position,
            joined_at: format_timestamp(member.joined_at),
            updated_at: format_timestamp(member.updated_at),
            left_at: member.left_at.map(format_timestamp),
        })
    }
}

impl TryFrom<GroupGoalMemberDB> for GroupGoalMember {
    type Error = Error;

    fn try_from(db: GroupGoalMemberDB) -> Result<Self> {
        Ok(Self {
            role: MemberRole::from_str(&db.role)?,
            status: MemberStatus::from_str(&db.status)?,
            current_contribution: parse_decimal(
                "group_goal_members.current_contribution",
                &db.current_contribution,
            )?,
            contribution_percentage: parse_decimal(
                "group_goal_members.contribution_percentage",
                &db.contribution_percentage,
            )?,
            joined_at: parse_timestamp("group_goal_members.joined_at", &db.joined_at)?,
            updated_at: parse_timestamp("group_goal_members.updated_at", &db.updated_at)?,
            left_at: parse_timestamp_opt("group_goal_members.left_at", db.left_at.as_deref())?,
            id: db.id,
            group_goal_id: db.group_goal_id,
            user_id: db.user_id,
        })
    }
}
