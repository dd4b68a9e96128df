//! HTTP token price oracle.
//!
//! Expects `GET {base_url}/quotes/{symbol}?quote={currency}` to answer
//! `{"rate": "<decimal>", "timestamp": "<RFC 3339>"}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use vaultledger_core::pricing::{PriceOracleTrait, PriceQuote};
use vaultledger_core::Result;

use crate::errors::ChainClientError;

const ENDPOINT: &str = "quotes";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    rate: String,
    timestamp: DateTime<Utc>,
}

pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChainClientError::from)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(
        &self,
        token_symbol: &str,
        quote_currency: &str,
    ) -> std::result::Result<PriceQuote, ChainClientError> {
        let url = format!("{}/{}/{}", self.base_url, ENDPOINT, token_symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("quote", quote_currency)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainClientError::Http {
                endpoint: url,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: QuoteResponse = response.json().await?;
        let rate = Decimal::from_str(body.rate.trim())
            .map_err(|e| ChainClientError::malformed(ENDPOINT, format!("rate {}: {}", body.rate, e)))?;
        if rate <= Decimal::ZERO {
            return Err(ChainClientError::malformed(
                ENDPOINT,
                format!("non-positive rate {}", rate),
            ));
        }
        debug!(
            "Quote {}/{} = {} at {}",
            token_symbol, quote_currency, rate, body.timestamp
        );
        Ok(PriceQuote {
            token_symbol: token_symbol.to_string(),
            quote_currency: quote_currency.to_string(),
            rate,
            timestamp: body.timestamp,
        })
    }
}

#[async_trait]
impl PriceOracleTrait for HttpPriceOracle {
    async fn latest_quote(&self, token_symbol: &str, quote_currency: &str) -> Result<PriceQuote> {
        Ok(self.fetch(token_symbol, quote_currency).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn quote_handler(
        Path(symbol): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        match (symbol.as_str(), params.get("quote").map(String::as_str)) {
            ("USDC", Some("KES")) => (
                StatusCode::OK,
                Json(json!({"rate": "129.5", "timestamp": "2026-01-05T10:00:00Z"})),
            ),
            ("BAD", _) => (
                StatusCode::OK,
                Json(json!({"rate": "-1", "timestamp": "2026-01-05T10:00:00Z"})),
            ),
            _ => (StatusCode::NOT_FOUND, Json(json!({"error": "unknown pair"}))),
        }
    }

    async fn spawn_oracle() -> String {
        let app = Router::new().route("/quotes/{symbol}", get(quote_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_reads_quote() {
        let oracle = HttpPriceOracle::new(spawn_oracle().await, Duration::from_secs(5)).unwrap();

        let quote = oracle.latest_quote("USDC", "KES").await.unwrap();

        assert_eq!(quote.rate, dec!(129.5));
        assert_eq!(quote.quote_currency, "KES");
        assert_eq!(quote.timestamp.to_rfc3339(), "2026-01-05T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unknown_pair_and_bad_rate_fail() {
        let oracle = HttpPriceOracle::new(spawn_oracle().await, Duration::from_secs(5)).unwrap();

        let missing = oracle.latest_quote("DAI", "KES").await.unwrap_err();
        assert!(missing.to_string().contains("404"));
        let bad = oracle.latest_quote("BAD", "KES").await.unwrap_err();
        assert!(bad.to_string().contains("non-positive"));
    }
}
