//! Column codecs and query helpers shared by the repositories.
//!
//! Amounts live in TEXT columns as decimal strings and timestamps as
//! RFC 3339 TEXT, so every read goes through one of the parsers below.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;
use vaultledger_core::Result;

/// Maximum number of parameters for SQLite IN (...) queries.
///
/// SQLite limits the number of bound parameters per statement (typically 999),
/// so long id lists are split into chunks of this size.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Chunk a slice into smaller slices for batch SQLite queries.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

fn invalid(column: &str, value: &str, reason: impl std::fmt::Display) -> vaultledger_core::Error {
    StorageError::InvalidStoredValue(format!("{} = '{}': {}", column, value, reason)).into()
}

pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

pub fn parse_decimal(column: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| invalid(column, value, e))
}

pub fn parse_decimal_opt(column: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    value.map(|v| parse_decimal(column, v)).transpose()
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(column, value, e))
}

pub fn parse_timestamp_opt(column: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, v)).transpose()
}

pub fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn parse_date_opt(column: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|e| invalid(column, v, e)))
        .transpose()
}

/// Block heights and log positions are `u64` in the domain and BIGINT here.
pub fn to_db_u64(column: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|e| invalid(column, &value.to_string(), e))
}

pub fn from_db_u64(column: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|e| invalid(column, &value.to_string(), e))
}

pub fn to_db_u32(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|e| invalid(column, &value.to_string(), e))
}

pub fn from_db_u32(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| invalid(column, &value.to_string(), e))
}

pub fn from_db_u8(column: &str, value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|e| invalid(column, &value.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_chunk_for_sqlite_splits_long_lists() {
        let items: Vec<i32> = (0..1001).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 1);
    }

    #[test]
    fn test_decimal_text_keeps_large_amounts() {
        let amount = dec!(79228162514264337593543950335);
        assert_eq!(parse_decimal("amount", &format_decimal(amount)).unwrap(), amount);
        assert_eq!(format_decimal(dec!(25.00)), "25");
    }

    #[test]
    fn test_bad_stored_values_are_reported() {
        let err = parse_decimal("amount", "12abc").unwrap_err();
        assert!(err.to_string().contains("amount"));
        assert!(from_db_u64("block_number", -1).is_err());
    }

    #[test]
    fn test_timestamp_text_round_trips() {
        let now = Utc::now();
        assert_eq!(parse_timestamp("created_at", &format_timestamp(now)).unwrap(), now);
    }
}
