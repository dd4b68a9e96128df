use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::utils::decimal_serde::decimal_str_serde;

/// Price of one whole token in a quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub token_symbol: String,
    pub quote_currency: String,
    #[serde(with = "decimal_str_serde")]
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    /// Rejects quotes older than `max_age_secs` at `now`.
    pub fn ensure_fresh(&self, max_age_secs: i64, now: DateTime<Utc>) -> Result<()> {
        let age = now.signed_duration_since(self.timestamp);
        if age > Duration::seconds(max_age_secs) {
            return Err(Error::InvalidState(format!(
                "Price quote for {}/{} is stale: {}s old, limit {}s",
                self.token_symbol,
                self.quote_currency,
                age.num_seconds(),
                max_age_secs
            )));
        }
        Ok(())
    }
}
