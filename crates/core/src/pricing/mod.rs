//! Price oracle boundary used for goal valuation.

mod pricing_model;
mod pricing_traits;

pub use pricing_model::PriceQuote;
pub use pricing_traits::PriceOracleTrait;
