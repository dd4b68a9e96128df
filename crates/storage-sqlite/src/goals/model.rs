//! Database models for goals.

use diesel::prelude::*;
use std::str::FromStr;

use vaultledger_core::goals::{Goal, GoalStatus, TokenIdentity};
use vaultledger_core::{Error, Result};

use crate::utils::{
    format_date, format_decimal, format_timestamp, from_db_u8, parse_date_opt, parse_decimal,
    parse_timestamp, parse_timestamp_opt,
};

/// Database model for goals
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::goals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct GoalDB {
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
    pub total_interest_earned: String,
    pub annual_interest_rate: String,
    pub last_interest_accrued_on: Option<String>,
    pub is_quick_save: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl From<&Goal> for GoalDB {
    fn from(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            owner_id: goal.owner_id.clone(),
            title: goal.title.clone(),
            description: goal.description.clone(),
            token_address: goal.token.address.clone(),
            token_symbol: goal.token.symbol.clone(),
            token_decimals: i32::from(goal.token.decimals),
            current_amount: format_decimal(goal.current_amount),
            target_amount: format_decimal(goal.target_amount),
            progress: format_decimal(goal.progress),
            status: goal.status.as_str().to_string(),
            total_interest_earned: format_decimal(goal.total_interest_earned),
            annual_interest_rate: format_decimal(goal.annual_interest_rate),
            last_interest_accrued_on: goal.last_interest_accrued_on.map(format_date),
            is_quick_save: goal.is_quick_save,
            version: goal.version,
            created_at: format_timestamp(goal.created_at),
            updated_at: format_timestamp(goal.updated_at),
            completed_at: goal.completed_at.map(format_timestamp),
        }
    }
}

impl TryFrom<GoalDB> for Goal {
    type Error = Error;

    fn try_from(db: GoalDB) -> Result<Self> {
        Ok(Self {
            token: TokenIdentity {
                address: db.token_address,
                symbol: db.token_symbol,
                decimals: from_db_u8("goals.token_decimals", db.token_decimals)?,
            },
            current_amount: parse_decimal("goals.current_amount", &db.current_amount)?,
            target_amount: parse_decimal("goals.target_amount", &db.target_amount)?,
            progress: parse_decimal("goals.progress", &db.progress)?,
            status: GoalStatus::from_str(&db.status)?,
            total_interest_earned: parse_decimal(
                "goals.total_interest_earned",
                &db.total_interest_earned,
            )?,
            annual_interest_rate: parse_decimal(
                "goals.annual_interest_rate",
                &db.annual_interest_rate,
            )?,
            last_interest_accrued_on: parse_date_opt(
                "goals.last_interest_accrued_on",
                db.last_interest_accrued_on.as_deref(),
            )?,
            created_at: parse_timestamp("goals.created_at", &db.created_at)?,
            updated_at: parse_timestamp("goals.updated_at", &db.updated_at)?,
            completed_at: parse_timestamp_opt("goals.completed_at", db.completed_at.as_deref())?,
            id: db.id,
            owner_id: db.owner_id,
            title: db.title,
            description: db.description,
            is_quick_save: db.is_quick_save,
            version: db.version,
        })
    }
}
