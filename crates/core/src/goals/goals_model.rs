//! Goals domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::PERCENT_PRECISION;
use crate::errors::{Error, Result, ValidationError};
use crate::transactions::{ChainSubmission, SavingsTransaction};
use crate::utils::amounts::{checked_balance_add, normalize_address};
use crate::utils::decimal_serde::{amount_serde, decimal_str_serde, percent_serde};

/// Token a goal is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdentity {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenIdentity {
    pub fn new(address: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            address: normalize_address(address),
            symbol: symbol.trim().to_string(),
            decimals,
        }
    }

    /// Same contract and same base unit. Symbols are display-only.
    pub fn same_token(&self, other: &TokenIdentity) -> bool {
        normalize_address(&self.address) == normalize_address(&other.address)
            && self.decimals == other.decimals
    }
}

impl fmt::Display for TokenIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        use GoalStatus::*;
        matches!(
            (self, next),
            (Active, Paused)
                | (Active, Completed)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "paused" => Ok(GoalStatus::Paused),
            "cancelled" => Ok(GoalStatus::Cancelled),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown goal status '{}'",
                other
            ))
            .into()),
        }
    }
}

/// `min(current / target * 100, 100)`, or 0 for a zero target.
pub fn compute_progress(current_amount: Decimal, target_amount: Decimal) -> Decimal {
    if target_amount <= Decimal::ZERO || current_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let hundred = Decimal::ONE_HUNDRED;
    let progress = current_amount
        .checked_div(target_amount)
        .and_then(|ratio| ratio.checked_mul(hundred))
        .unwrap_or(hundred);
    progress.min(hundred).round_dp(PERCENT_PRECISION)
}

/// Domain model representing a single-owner savings goal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
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
    #[serde(with = "amount_serde")]
    pub total_interest_earned: Decimal,
    #[serde(with = "decimal_str_serde")]
    pub annual_interest_rate: Decimal,
    pub last_interest_accrued_on: Option<NaiveDate>,
    pub is_quick_save: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn from_new(new_goal: NewGoal, default_rate: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: new_goal.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            owner_id: new_goal.owner_id,
            title: new_goal.title,
            description: new_goal.description,
            token: TokenIdentity::new(
                &new_goal.token.address,
                &new_goal.token.symbol,
                new_goal.token.decimals,
            ),
            current_amount: Decimal::ZERO,
            target_amount: new_goal.target_amount,
            progress: Decimal::ZERO,
            status: GoalStatus::Active,
            total_interest_earned: Decimal::ZERO,
            annual_interest_rate: new_goal.annual_interest_rate.unwrap_or(default_rate),
            last_interest_accrued_on: None,
            is_quick_save: new_goal.is_quick_save,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn ensure_accepts_deposits(&self) -> Result<()> {
        if self.status != GoalStatus::Active {
            return Err(Error::InvalidState(format!(
                "Goal {} is {} and does not accept deposits",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.status == GoalStatus::Cancelled {
            return Err(Error::InvalidState(format!(
                "Goal {} is cancelled",
                self.id
            )));
        }
        Ok(())
    }

    /// Adds `amount`, refusing sums outside the Decimal range.
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        self.current_amount = checked_balance_add(self.current_amount, amount)?;
        self.refresh_progress();
        Ok(())
    }

    /// Removes `amount`, refusing to go below zero.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if amount > self.current_amount {
            return Err(Error::InsufficientBalance {
                goal_id: self.id.clone(),
                requested: amount,
                available: self.current_amount,
            });
        }
        self.current_amount -= amount;
        self.refresh_progress();
        Ok(())
    }

    pub fn credit_interest(&mut self, amount: Decimal) -> Result<()> {
        let total_interest = checked_balance_add(self.total_interest_earned, amount)?;
        self.credit(amount)?;
        self.total_interest_earned = total_interest;
        Ok(())
    }

    /// Applies a signed correction (authoritative chain amount minus booked amount).
    pub fn adjust(&mut self, delta: Decimal) -> Result<()> {
        if delta >= Decimal::ZERO {
            self.credit(delta)
        } else {
            self.debit(-delta)
        }
    }

    pub fn refresh_progress(&mut self) {
        self.progress = compute_progress(self.current_amount, self.target_amount);
    }

    pub fn set_status(&mut self, next: GoalStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "Goal {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        if next == GoalStatus::Cancelled && self.current_amount > Decimal::ZERO {
            return Err(Error::InvalidState(format!(
                "Goal {} still holds {} and cannot be cancelled",
                self.id, self.current_amount
            )));
        }
        if next == GoalStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Bumps the optimistic-concurrency version for a write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Input model for creating a new goal
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub id: Option<String>,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub token: TokenIdentity,
    #[serde(with = "amount_serde")]
    pub target_amount: Decimal,
    #[serde(default, with = "crate::utils::decimal_serde::decimal_str_serde_option")]
    pub annual_interest_rate: Option<Decimal>,
    #[serde(default)]
    pub is_quick_save: bool,
}

impl NewGoal {
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
        if let Some(rate) = self.annual_interest_rate {
            if rate < Decimal::ZERO {
                return Err(ValidationError::InvalidInput(format!(
                    "Interest rate must not be negative: {}",
                    rate
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoalDepositRequest {
    pub goal_id: String,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub submission: Option<ChainSubmission>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithdrawalRequest {
    pub goal_id: String,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub submission: Option<ChainSubmission>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoalTransferRequest {
    pub from_goal_id: String,
    pub to_goal_id: String,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
}

/// Updated goal plus the ledger entry the operation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithTransaction {
    pub goal: Goal,
    pub transaction: SavingsTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalTransferResult {
    pub from_goal: Goal,
    pub to_goal: Goal,
    pub transaction: SavingsTransaction,
}

/// Result of a daily interest run. `transaction` is None when the day was
/// already accrued or the interest rounds down to zero base units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestAccrual {
    pub goal: Goal,
    pub transaction: Option<SavingsTransaction>,
    pub accrued_on: NaiveDate,
}

/// Goal balance expressed in a quote currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalValuation {
    pub goal_id: String,
    pub quote_currency: String,
    #[serde(with = "decimal_str_serde")]
    pub token_amount: Decimal,
    #[serde(with = "decimal_str_serde")]
    pub rate: Decimal,
    #[serde(with = "decimal_str_serde")]
    pub value: Decimal,
    pub quoted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn goal(target: Decimal) -> Goal {
        Goal::from_new(
            NewGoal {
                id: Some("g1".to_string()),
                owner_id: "user-1".to_string(),
                title: "Rent".to_string(),
                description: None,
                token: TokenIdentity::new("0xUSDC", "USDC", 6),
                target_amount: target,
                annual_interest_rate: None,
                is_quick_save: false,
            },
            dec!(0.05),
            Utc::now(),
        )
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(compute_progress(dec!(250), dec!(1000)), dec!(25));
        assert_eq!(compute_progress(dec!(5000), dec!(1000)), dec!(100));
        assert_eq!(compute_progress(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(compute_progress(dec!(1), dec!(3)), dec!(33.33));
    }

    #[test]
    fn test_debit_beyond_balance_leaves_goal_untouched() {
        let mut g = goal(dec!(1000));
        g.credit(dec!(250)).unwrap();
        let before = g.clone();
        let err = g.debit(dec!(300)).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(g, before);
    }

    #[test]
    fn test_cancel_requires_empty_goal() {
        let mut g = goal(dec!(1000));
        g.credit(dec!(1)).unwrap();
        assert!(g.set_status(GoalStatus::Cancelled, Utc::now()).is_err());
        g.debit(dec!(1)).unwrap();
        g.set_status(GoalStatus::Cancelled, Utc::now()).unwrap();
        assert!(g.set_status(GoalStatus::Active, Utc::now()).is_err());
    }

    #[test]
    fn test_token_identity_ignores_case_and_symbol() {
        let a = TokenIdentity::new("0xABC", "USDC", 6);
        let b = TokenIdentity::new("0xabc", "USDC.e", 6);
        let c = TokenIdentity::new("0xabc", "USDC", 18);
        assert!(a.same_token(&b));
        assert!(!a.same_token(&c));
    }

    #[test]
    fn test_credit_past_decimal_range_is_rejected() {
        let mut g = goal(dec!(1000));
        g.credit(Decimal::MAX - dec!(10)).unwrap();
        let before = g.clone();
        let err = g.credit(dec!(50000000000000000000000000000)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::AmountOutOfRange(_))
        ));
        assert_eq!(g, before);
        assert!(g.credit_interest(dec!(11)).is_err());
        assert_eq!(g, before);
    }

    #[test]
    fn test_adjust_negative_delta_debits() {
        let mut g = goal(dec!(1000));
        g.credit(dec!(100)).unwrap();
        g.adjust(dec!(-40)).unwrap();
        assert_eq!(g.current_amount, dec!(60));
        assert!(g.adjust(dec!(-61)).is_err());
    }
}
