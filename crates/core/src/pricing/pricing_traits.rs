use async_trait::async_trait;

use super::pricing_model::PriceQuote;
use crate::errors::Result;

/// Token price lookup. Implementations live outside the ledger.
#[async_trait]
pub trait PriceOracleTrait: Send + Sync {
    async fn latest_quote(&self, token_symbol: &str, quote_currency: &str) -> Result<PriceQuote>;
}
