//! Token amount parsing and address normalization.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::{Error, Result, ValidationError};

/// Parses a token amount given in integer base units ("1000000").
///
/// Rejects negatives, fractions and anything that does not fit the ledger's
/// numeric range; never rounds.
pub fn parse_token_amount(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidAmount(raw.to_string()).into());
    }
    Decimal::from_str(trimmed).map_err(|_| ValidationError::InvalidAmount(raw.to_string()).into())
}

/// Ensures an amount used for a ledger operation is a positive integer.
pub fn require_positive_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO || amount.fract() != Decimal::ZERO {
        return Err(Error::Validation(ValidationError::InvalidAmount(
            amount.to_string(),
        )));
    }
    Ok(amount.normalize())
}

/// `balance + amount`, rejected when the sum leaves the Decimal range.
pub fn checked_balance_add(balance: Decimal, amount: Decimal) -> Result<Decimal> {
    balance.checked_add(amount).ok_or_else(|| {
        ValidationError::AmountOutOfRange(format!("{} + {}", balance, amount)).into()
    })
}

/// Lower-cases and trims a hex address or hash so lookups are case-insensitive.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// `10^decimals` as a Decimal, or None when it exceeds the Decimal range.
pub fn token_unit(decimals: u8) -> Option<Decimal> {
    let mut unit = Decimal::ONE;
    for _ in 0..decimals {
        unit = unit.checked_mul(Decimal::TEN)?;
    }
    Some(unit)
}
